//! Cellular modem control: serial AT transport, response parsing, typed
//! command construction, and the session bring-up state machine.

mod bringup;
mod command;
pub mod parse;
mod transport;

pub use bringup::{BringupPolicy, Modem, Phase};
pub use command::AtCommand;
pub use transport::{AtLink, UartLink};

#[cfg(test)]
pub(crate) mod testutil {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;
    use std::time::Duration;

    use super::transport::AtLink;

    struct Rule {
        prefix: &'static str,
        responses: VecDeque<String>,
    }

    /// Scripted serial link: records every command sent and answers from
    /// a first-match table of command-prefix rules. A rule with several
    /// responses pops them in order and repeats the last one; commands
    /// with no matching rule get a plain OK.
    pub struct ScriptLink {
        pub sent: Rc<RefCell<Vec<String>>>,
        rules: Vec<Rule>,
    }

    impl ScriptLink {
        pub fn new() -> Self {
            Self {
                sent: Rc::new(RefCell::new(Vec::new())),
                rules: Vec::new(),
            }
        }

        pub fn rule(mut self, prefix: &'static str, responses: &[&str]) -> Self {
            self.rules.push(Rule {
                prefix,
                responses: responses.iter().map(|s| s.to_string()).collect(),
            });
            self
        }

        /// Replaces an existing rule for `prefix`, or adds one in front
        /// so it wins over broader rules.
        pub fn rule_override(mut self, prefix: &'static str, responses: &[&str]) -> Self {
            let responses: VecDeque<String> = responses.iter().map(|s| s.to_string()).collect();
            if let Some(rule) = self.rules.iter_mut().find(|r| r.prefix == prefix) {
                rule.responses = responses;
            } else {
                self.rules.insert(0, Rule { prefix, responses });
            }
            self
        }
    }

    impl AtLink for ScriptLink {
        fn send(&mut self, cmd: &str, _timeout: Duration) -> String {
            self.sent.borrow_mut().push(cmd.to_string());
            for rule in self.rules.iter_mut() {
                if cmd.starts_with(rule.prefix) {
                    return if rule.responses.len() > 1 {
                        rule.responses.pop_front().unwrap_or_default()
                    } else {
                        rule.responses.front().cloned().unwrap_or_default()
                    };
                }
            }
            "\r\nOK\r\n".to_string()
        }
    }

    pub fn sent_count(sent: &Rc<RefCell<Vec<String>>>, prefix: &str) -> usize {
        sent.borrow().iter().filter(|c| c.starts_with(prefix)).count()
    }
}

//! Embedded HTML for the status/control page.

pub const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>CellGate Gateway</title>
    <style>
        * { box-sizing: border-box; margin: 0; padding: 0; }
        body {
            font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
            background: #1a1a2e;
            color: #eee;
            min-height: 100vh;
            padding: 20px;
        }
        .container {
            max-width: 420px;
            margin: 0 auto;
        }
        h1 {
            text-align: center;
            margin-bottom: 24px;
            font-size: 24px;
            color: #00d4ff;
        }
        .card {
            background: #16213e;
            padding: 14px;
            border-radius: 8px;
            margin-bottom: 16px;
            font-size: 14px;
        }
        .card .row {
            display: flex;
            justify-content: space-between;
            padding: 4px 0;
        }
        .card .row span:last-child { color: #00d4ff; }
        .ok { color: #4ade80 !important; }
        .bad { color: #f87171 !important; }
        input {
            width: 100%;
            padding: 12px;
            border: 1px solid #333;
            border-radius: 8px;
            background: #16213e;
            color: #fff;
            font-size: 16px;
            margin-bottom: 12px;
        }
        button {
            width: 100%;
            padding: 14px;
            border: none;
            border-radius: 8px;
            font-size: 16px;
            cursor: pointer;
            min-height: 48px;
            margin-bottom: 12px;
        }
        .btn-fetch { background: #00d4ff; color: #1a1a2e; font-weight: bold; }
        .btn-restart { background: #4d1e1e; color: #f87171; }
        #last-error { color: #f87171; margin-top: 8px; }
    </style>
</head>
<body>
    <div class="container">
        <h1>CellGate Gateway</h1>

        <div class="card" id="status-card">
            <div class="row"><span>Cellular</span><span id="cellular">-</span></div>
            <div class="row"><span>Operator</span><span id="operator">-</span></div>
            <div class="row"><span>Signal (CSQ)</span><span id="signal">-</span></div>
            <div class="row"><span>IP address</span><span id="ip">-</span></div>
            <div class="row"><span>Data used</span><span id="data">-</span></div>
            <div class="row"><span>Clients</span><span id="clients">-</span></div>
            <div class="row"><span>Uptime</span><span id="uptime">-</span></div>
            <div class="row"><span>Free heap</span><span id="heap">-</span></div>
            <div id="last-error"></div>
        </div>

        <form id="proxy-form">
            <input type="text" id="url" placeholder="http://example.com/">
            <button type="submit" class="btn-fetch">Fetch via cellular</button>
        </form>

        <button class="btn-restart" id="restart-btn">Restart gateway</button>
    </div>

    <script>
        async function loadStatus() {
            try {
                const resp = await fetch('/status');
                const data = await resp.json();
                const cell = document.getElementById('cellular');
                cell.textContent = data.cellular_connected ? 'connected' : 'down';
                cell.className = data.cellular_connected ? 'ok' : 'bad';
                document.getElementById('operator').textContent = data.operator || '-';
                document.getElementById('signal').textContent = data.signal_strength;
                document.getElementById('ip').textContent = data.ip_address || '-';
                document.getElementById('data').textContent = data.data_used + ' B';
                document.getElementById('clients').textContent = data.connected_clients;
                document.getElementById('uptime').textContent = data.uptime + ' s';
                document.getElementById('heap').textContent = data.free_heap + ' B';
                document.getElementById('last-error').textContent = data.last_error || '';
            } catch (e) {
                console.error('Failed to load status:', e);
            }
        }

        document.getElementById('proxy-form').addEventListener('submit', (e) => {
            e.preventDefault();
            const url = document.getElementById('url').value;
            if (url) window.location = '/proxy?url=' + encodeURIComponent(url);
        });

        document.getElementById('restart-btn').addEventListener('click', async () => {
            await fetch('/restart');
            document.getElementById('last-error').textContent = 'Restarting...';
        });

        loadStatus();
        setInterval(loadStatus, 5000);
    </script>
</body>
</html>"#;

//! Static HTML pages. Presentation only; the forms post to the JSON API.

/// Placeholder replaced with the configured multipart field name.
const FIELD_PLACEHOLDER: &str = "__FIELD__";

const MODE_SELECTOR: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>DNG to PNG Converter</title>
  <style>
    body { font-family: Arial, sans-serif; max-width: 800px; margin: 0 auto; padding: 20px; background: #f5f5f5; }
    .container { background: white; padding: 30px; border-radius: 10px; box-shadow: 0 2px 10px rgba(0,0,0,0.1); }
    h1 { color: #333; text-align: center; }
    .mode { display: block; padding: 20px; margin: 15px 0; border: 2px solid #ddd; border-radius: 8px; color: #333; text-decoration: none; }
    .mode:hover { border-color: #007bff; }
  </style>
</head>
<body>
  <div class="container">
    <h1>DNG to PNG Converter</h1>
    <a class="mode" href="/api-mode">
      <h2>API Mode</h2>
      <p>Upload the DNG file; the server decodes it and returns a PNG download.</p>
    </a>
    <a class="mode" href="/wasm-mode">
      <h2>WASM Mode</h2>
      <p>Decode in the browser without uploading the file.</p>
    </a>
  </div>
</body>
</html>
"#;

const API_MODE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>DNG to PNG Converter - API Mode</title>
  <style>
    body { font-family: Arial, sans-serif; max-width: 800px; margin: 0 auto; padding: 20px; background: #f5f5f5; }
    .container { background: white; padding: 30px; border-radius: 10px; box-shadow: 0 2px 10px rgba(0,0,0,0.1); }
    input[type="file"] { width: 100%; padding: 10px; margin: 10px 0; border: 2px dashed #ccc; border-radius: 5px; }
    button { background: #007bff; color: white; padding: 12px 30px; border: none; border-radius: 5px; cursor: pointer; width: 100%; }
    button:disabled { background: #ccc; }
    .success { color: #155724; background: #d4edda; padding: 10px; border-radius: 5px; }
    .error { color: #721c24; background: #f8d7da; padding: 10px; border-radius: 5px; }
  </style>
</head>
<body>
  <div class="container">
    <a href="/">&larr; Back to Mode Selection</a>
    <h1>DNG to PNG Converter</h1>
    <form id="uploadForm">
      <input type="file" id="dngFile" accept=".dng,.DNG" required>
      <button type="submit" id="convertBtn">Convert to PNG</button>
    </form>
    <div id="result"></div>
  </div>
  <script>
    document.getElementById('uploadForm').addEventListener('submit', async function (e) {
      e.preventDefault();
      const file = document.getElementById('dngFile').files[0];
      const result = document.getElementById('result');
      const button = document.getElementById('convertBtn');
      if (!file) {
        result.innerHTML = '<div class="error">Please select a DNG file.</div>';
        return;
      }
      const form = new FormData();
      form.append('__FIELD__', file);
      button.disabled = true;
      button.textContent = 'Converting...';
      try {
        const response = await fetch('/api-mode/convert', { method: 'POST', body: form });
        const data = await response.json();
        if (response.ok) {
          result.innerHTML = '<div class="success">Conversion completed. <a download href="/api-mode/download/' +
            encodeURIComponent(data.filename) + '">Download PNG file</a></div>';
        } else {
          result.innerHTML = '<div class="error">Error: ' + data.message + '</div>';
        }
      } catch (err) {
        result.innerHTML = '<div class="error">Conversion failed: ' + err.message + '</div>';
      } finally {
        button.disabled = false;
        button.textContent = 'Convert to PNG';
      }
    });
  </script>
</body>
</html>
"#;

const WASM_MODE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>DNG to PNG Converter - WASM Mode</title>
</head>
<body>
  <a href="/">&larr; Back to Mode Selection</a>
  <h1>DNG to PNG Converter</h1>
  <p>WASM mode decodes the file entirely in the browser. Nothing is uploaded to this server.</p>
  <noscript>This mode requires JavaScript and WebAssembly.</noscript>
</body>
</html>
"#;

pub fn mode_selector() -> &'static str {
    MODE_SELECTOR
}

/// Upload form posting `field` to `/api-mode/convert`.
pub fn api_mode(field: &str) -> String {
    API_MODE.replace(FIELD_PLACEHOLDER, field)
}

pub fn wasm_mode() -> &'static str {
    WASM_MODE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_mode_uses_configured_field() {
        let html = api_mode("rawUpload");
        assert!(html.contains("form.append('rawUpload', file)"));
        assert!(!html.contains(FIELD_PLACEHOLDER));
    }
}

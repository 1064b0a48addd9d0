use axum::response::Html;

const UPLOAD_FORM: &str = r#"<!DOCTYPE html>
<html>
  <head><title>PDF to Text (OCR)</title></head>
  <body>
    <h2>PDF to Text (OCR)</h2>
    <form action="/ocr" method="post" enctype="multipart/form-data">
      <input type="file" name="pdf" accept=".pdf,application/pdf" required />
      <br><br>
      <button type="submit">Extract Text</button>
    </form>
  </body>
</html>
"#;

/// Bare upload form for people using a browser.
pub async fn index_handler() -> Html<&'static str> {
    Html(UPLOAD_FORM)
}

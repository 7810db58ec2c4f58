//! HTML documents served to browsers. Every piece of user supplied text goes
//! through [`escape_html`] before it is interpolated.

use ephemeral_common::PasteView;

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn document(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        escape_html(title),
        body
    )
}

pub fn home_page() -> String {
    document(
        "New paste",
        r#"<h2>Create Paste</h2>
<form method="POST" action="/ui/create">
<textarea name="content" rows="10" cols="50" required></textarea><br><br>
TTL seconds (optional): <input type="number" name="ttl_seconds" min="1"><br><br>
Max views (optional): <input type="number" name="max_views" min="1"><br><br>
<button type="submit">Create</button>
</form>"#,
    )
}

pub fn created_page(url: &str) -> String {
    let url = escape_html(url);
    document(
        "Paste created",
        &format!("<p>Paste created</p>\n<a href=\"{url}\">{url}</a>"),
    )
}

pub fn paste_page(view: &PasteView) -> String {
    let mut notes = String::new();
    if let Some(remaining) = view.remaining_views {
        notes.push_str(&format!("<p>Views remaining: {remaining}</p>\n"));
    }
    if let Some(expires_at) = view.expires_at {
        notes.push_str(&format!(
            "<p>Expires at: <time datetime=\"{0}\">{0}</time></p>\n",
            expires_at.to_rfc3339()
        ));
    }

    document(
        "Paste",
        &format!("<pre>{}</pre>\n{notes}", escape_html(&view.content)),
    )
}

pub fn unavailable_page() -> String {
    document("Paste unavailable", "<p>This paste does not exist or has expired.</p>")
}

pub fn error_page(message: &str) -> String {
    document(
        "Error",
        &format!("<p>Error: {}</p>", escape_html(message)),
    )
}

//! Preview document construction
//!
//! Wraps edited source into a complete HTML document according to its
//! language. Unknown or absent languages are shown as escaped plain text.

/// Attribute marking stylesheets injected after the document was rendered
pub const INJECTED_STYLE_ATTR: &str = "data-forge-injected";

/// Build the document for `payload` rendered as `language`
pub fn render_document(payload: &str, language: Option<&str>) -> String {
    let language = language.map(|l| l.trim().to_ascii_lowercase());
    match language.as_deref() {
        Some("html" | "htm") => {
            if payload.to_ascii_lowercase().contains("<html") {
                payload.to_string()
            } else {
                shell("", payload)
            }
        }
        Some("css") => shell(
            &format!("<style>{}</style>", payload),
            &format!("<pre>{}</pre>", escape_html(payload)),
        ),
        Some("javascript" | "js") => shell(
            "",
            &format!("<script>{}</script>", payload.replace("</script", "<\\/script")),
        ),
        Some("svg") if payload.trim_start().starts_with("<svg") => shell("", payload),
        _ => plain_document(payload),
    }
}

/// Escaped plain-text document
pub fn plain_document(text: &str) -> String {
    shell("", &format!("<pre>{}</pre>", escape_html(text)))
}

/// Visible document shown when rendering failed
pub fn error_document(message: &str) -> String {
    shell(
        "<style>.forge-error{color:#b00020;font-family:monospace;}</style>",
        &format!(
            "<div class=\"forge-error\"><h1>Preview failed</h1><pre>{}</pre></div>",
            escape_html(message)
        ),
    )
}

/// Add a stylesheet to an existing document
pub fn inject_style(document: &str, css: &str) -> String {
    let tag = format!("<style {}>{}</style>", INJECTED_STYLE_ATTR, css);
    let lower = document.to_ascii_lowercase();

    let at = lower
        .find("</head>")
        .or_else(|| lower.find("<body"))
        .or_else(|| lower.find("</html>"));
    match at {
        Some(index) => {
            let mut out = String::with_capacity(document.len() + tag.len());
            out.push_str(&document[..index]);
            out.push_str(&tag);
            out.push_str(&document[index..]);
            out
        }
        None => format!("{}{}", tag, document),
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn shell(head: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n{}\n</head>\n<body>\n{}\n</body>\n</html>\n",
        head, body
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_fragment_is_wrapped() {
        let doc = render_document("<h1>Hi</h1>", Some("HTML"));
        assert!(doc.starts_with("<!DOCTYPE html>"));
        assert!(doc.contains("<body>\n<h1>Hi</h1>\n</body>"));

        let full = "<html><body>own</body></html>";
        assert_eq!(render_document(full, Some("html")), full);
    }

    #[test]
    fn test_unknown_language_is_escaped_text() {
        let doc = render_document("a < b && c", Some("python"));
        assert!(doc.contains("<pre>a &lt; b &amp;&amp; c</pre>"));
        assert_eq!(render_document("x", None), plain_document("x"));
    }

    #[test]
    fn test_script_cannot_close_early() {
        let doc = render_document("let s = '</script>';", Some("js"));
        assert!(doc.contains("<script>let s = '<\\/script>';</script>"));
    }

    #[test]
    fn test_css_and_svg() {
        let doc = render_document("body { color: red; }", Some("css"));
        assert!(doc.contains("<style>body { color: red; }</style>"));

        let svg = "<svg width=\"10\"></svg>";
        assert!(render_document(svg, Some("svg")).contains(svg));
        assert!(render_document("not svg", Some("svg")).contains("<pre>not svg</pre>"));
    }

    #[test]
    fn test_inject_style_before_head_end() {
        let doc = plain_document("x");
        let styled = inject_style(&doc, "pre{margin:0}");
        let style_at = styled.find("<style data-forge-injected>pre{margin:0}</style>").unwrap();
        assert!(style_at < styled.find("</head>").unwrap());

        assert_eq!(inject_style("bare", "a{}"), "<style data-forge-injected>a{}</style>bare");
    }

    #[test]
    fn test_error_document_escapes_message() {
        let doc = error_document("<bad>");
        assert!(doc.contains("&lt;bad&gt;"));
        assert!(doc.contains("Preview failed"));
    }
}

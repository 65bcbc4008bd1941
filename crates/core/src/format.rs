//! HTML fragments for the reporter's web viewer
//!
//! All user-provided text passes through [`escape`] before it is wrapped.

/// Colors used in report messages
pub mod color {
    pub const GREEN: &str = "#2e7d32";
    pub const RED: &str = "#c62828";
    pub const ORANGE: &str = "#ef6c00";
    pub const BLUE: &str = "#1565c0";
    pub const GREY: &str = "#616161";
    pub const PURPLE: &str = "#6a1b9a";
}

/// Escape text for inclusion in an HTML fragment
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn bold(text: &str) -> String {
    format!("<b>{}</b>", escape(text))
}

pub fn italic(text: &str) -> String {
    format!("<i>{}</i>", escape(text))
}

pub fn code(text: &str) -> String {
    format!("<code>{}</code>", escape(text))
}

pub fn colored(text: &str, color: &str) -> String {
    format!("<span style=\"color:{}\">{}</span>", color, escape(text))
}

/// Bold and colored, used for labels like `PASSED`
pub fn badge(text: &str, color: &str) -> String {
    format!("<b style=\"color:{}\">{}</b>", color, escape(text))
}

pub fn header(title: &str) -> String {
    format!("<h3>{}</h3>", escape(title))
}

/// Render rows as an HTML table. The first row is the header row.
pub fn table(title: &str, rows: &[Vec<String>]) -> String {
    let mut html = format!("{}<table border=\"1\">", bold(title));
    for (i, row) in rows.iter().enumerate() {
        let cell = if i == 0 { "th" } else { "td" };
        html.push_str("<tr>");
        for value in row {
            html.push_str(&format!("<{cell}>{}</{cell}>", escape(value)));
        }
        html.push_str("</tr>");
    }
    html.push_str("</table>");
    html
}

/// Strip tags for console output. Entities from [`escape`] are decoded.
pub fn to_plain(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(escape("<a href='x'>&</a>"), "&lt;a href=&#39;x&#39;&gt;&amp;&lt;/a&gt;");
    }

    #[test]
    fn test_colored_escapes_content() {
        let html = colored("1 < 2", color::GREEN);
        assert_eq!(html, "<span style=\"color:#2e7d32\">1 &lt; 2</span>");
    }

    #[test]
    fn test_table_header_row() {
        let rows = vec![
            vec!["Field".to_string(), "Value".to_string()],
            vec!["user".to_string(), "alice".to_string()],
        ];
        let html = table("Credentials", &rows);
        assert!(html.starts_with("<b>Credentials</b><table"));
        assert!(html.contains("<th>Field</th>"));
        assert!(html.contains("<td>alice</td>"));
    }

    #[test]
    fn test_to_plain_round_trips_text() {
        let html = format!("{} on {}", bold("Click"), italic("#submit & <go>"));
        assert_eq!(to_plain(&html), "Click on #submit & <go>");
    }
}

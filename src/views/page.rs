//! HTML page layout and small widgets shared by the sections

use super::Section;
use std::fmt::Write as _;

pub const PAGE_TITLE: &str = "Exploratorio Risk Load";
pub const FOOTER: &str = "Dashboard interactivo para exploración de Risk Load";

const STYLE: &str = "\
body{margin:0;font-family:Helvetica,Arial,sans-serif;color:#262730;display:flex}\
nav{width:240px;min-height:100vh;background:#f0f2f6;padding:16px;box-sizing:border-box}\
main{flex:1;padding:24px 40px;min-width:0}\
table{border-collapse:collapse;font-size:13px;margin:8px 0;display:block;overflow-x:auto}\
th,td{border:1px solid #e6e9ef;padding:4px 8px;text-align:right;white-space:nowrap}\
th{background:#f8f9fb}\
.metrics{display:flex;gap:48px}.metric .v{font-size:32px}\
.alert{padding:12px 16px;border-radius:6px;margin:12px 0}\
.alert.error{background:#ffe2e2;color:#7d353b}.alert.warning{background:#fffce7;color:#926c05}\
.caption{color:#808495;font-size:13px}";

/// Escape text for HTML element content and attribute values
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

/// Severity of an inline message box
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    Error,
    Warning,
}

pub fn alert(kind: AlertKind, message: &str) -> String {
    let class = match kind {
        AlertKind::Error => "error",
        AlertKind::Warning => "warning",
    };
    format!("<div class=\"alert {}\">{}</div>", class, escape(message))
}

pub fn heading(text: &str) -> String {
    format!("<h1>{}</h1>", escape(text))
}

pub fn subheading(text: &str) -> String {
    format!("<h3>{}</h3>", escape(text))
}

pub fn metric(label: &str, value: &str) -> String {
    format!(
        "<div class=\"metric\"><div>{}</div><div class=\"v\">{}</div></div>",
        escape(label),
        escape(value)
    )
}

/// Plain table; cells are escaped
pub fn table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut out = String::from("<table><thead><tr>");
    for h in headers {
        let _ = write!(out, "<th>{}</th>", escape(h));
    }
    out.push_str("</tr></thead><tbody>");
    for row in rows {
        out.push_str("<tr>");
        for cell in row {
            let _ = write!(out, "<td>{}</td>", escape(cell));
        }
        out.push_str("</tr>");
    }
    out.push_str("</tbody></table>");
    out
}

/// Drop-down bound to a query parameter
pub fn select(name: &str, label: &str, options: &[&str], selected: &str) -> String {
    let mut out = format!(
        "<label>{} <select name=\"{}\" onchange=\"this.form.submit()\">",
        escape(label),
        escape(name)
    );
    for option in options {
        let _ = write!(
            out,
            "<option value=\"{v}\"{s}>{v}</option>",
            v = escape(option),
            s = if *option == selected { " selected" } else { "" }
        );
    }
    out.push_str("</select></label> ");
    out
}

/// GET form carrying the current section plus the given controls
pub fn selection_form(section: Section, controls: &[String]) -> String {
    format!(
        "<form method=\"get\"><input type=\"hidden\" name=\"section\" value=\"{}\">{}</form>",
        section.slug(),
        controls.concat()
    )
}

fn sidebar(current: Section) -> String {
    let mut out = String::from("<nav><h2>Menú</h2><form method=\"get\"><p>Sección:</p>");
    for section in Section::ALL {
        let _ = write!(
            out,
            "<label><input type=\"radio\" name=\"section\" value=\"{}\" onchange=\"this.form.submit()\"{}> {}</label><br>",
            section.slug(),
            if section == current { " checked" } else { "" },
            escape(section.label())
        );
    }
    out.push_str("</form></nav>");
    out
}

/// Full HTML document: sidebar, section body and footer
pub fn page(current: Section, body: &str) -> String {
    format!(
        "<!DOCTYPE html><html lang=\"es\"><head><meta charset=\"utf-8\"><title>{title}</title><style>{style}</style></head><body>{nav}<main>{body}<hr><p class=\"caption\">{footer}</p></main></body></html>",
        title = escape(PAGE_TITLE),
        style = STYLE,
        nav = sidebar(current),
        body = body,
        footer = escape(FOOTER)
    )
}

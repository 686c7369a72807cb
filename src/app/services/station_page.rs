//! HTML extraction for portal pages
//!
//! The portal renders plain server-side HTML. Only a handful of elements are
//! needed: a hidden form input on the login page, the flash message and
//! version paragraph on the landing page, and the record tables on a station
//! page. These are located with tag-level pattern matching rather than a full
//! DOM.

use regex::Regex;
use std::sync::LazyLock;

static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)([a-z_:][-a-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
        .expect("attribute pattern")
});
static INPUT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<input\b([^>]*)>").expect("input pattern"));
static LI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<li\b[^>]*>(.*?)</li>").expect("li pattern"));
static DIV_OPEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<div\b([^>]*)>").expect("div pattern"));
static P_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<p\b[^>]*>(.*?)</p>").expect("p pattern"));
static TABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<table\b([^>]*)>(.*?)</table>").expect("table pattern")
});
static TBODY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<tbody\b[^>]*>(.*?)</tbody>").expect("tbody pattern"));
static TR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr>").expect("tr pattern"));
static TD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<td\b[^>]*>(.*?)</td>").expect("td pattern"));
static ANCHOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<a\b([^>]*)>").expect("anchor pattern"));

/// One `<td>` of a table row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlCell {
    /// Visible text, tags stripped and whitespace collapsed
    pub text: String,

    /// `href` of every anchor in the cell, in document order
    pub hrefs: Vec<String>,
}

/// One `<tr>` of a table body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlRow {
    pub cells: Vec<HtmlCell>,
}

impl HtmlRow {
    /// All anchor targets of the row, cell by cell
    pub fn hrefs(&self) -> impl Iterator<Item = &str> {
        self.cells
            .iter()
            .flat_map(|cell| cell.hrefs.iter().map(String::as_str))
    }

    /// Displayed text of the first cell
    pub fn first_cell_text(&self) -> Option<&str> {
        self.cells.first().map(|cell| cell.text.as_str())
    }
}

/// Value of an attribute inside an opening tag's attribute string
fn attribute<'a>(attrs: &'a str, name: &str) -> Option<&'a str> {
    ATTR_RE.captures_iter(attrs).find_map(|caps| {
        let key = caps.get(1)?.as_str();
        if !key.eq_ignore_ascii_case(name) {
            return None;
        }
        caps.get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map(|m| m.as_str())
    })
}

/// Decode the few entities the portal emits in text nodes and attributes
pub fn normalize_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

/// Collapse runs of whitespace and trim
pub fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Visible text of an HTML fragment
pub fn strip_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;

    for ch in s.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    normalize_ws(&normalize_entities(&out))
}

/// Value of the named `<input>` field, e.g. the anti-forgery token
pub fn input_value(html: &str, field_name: &str) -> Option<String> {
    INPUT_RE.captures_iter(html).find_map(|caps| {
        let attrs = caps.get(1)?.as_str();
        if attribute(attrs, "name")? != field_name {
            return None;
        }
        attribute(attrs, "value").map(normalize_entities)
    })
}

/// Whether any `<li>` contains the given text (flash messages)
pub fn has_list_item_containing(html: &str, needle: &str) -> bool {
    LI_RE
        .captures_iter(html)
        .any(|caps| strip_tags(&caps[1]).contains(needle))
}

/// Text following `prefix` in the first `<p>` after a `<div>` with class `div_class`
pub fn paragraph_after_div(html: &str, div_class: &str, prefix: &str) -> Option<String> {
    let div_start = DIV_OPEN_RE.captures_iter(html).find_map(|caps| {
        let classes = attribute(caps.get(1)?.as_str(), "class")?;
        classes
            .split_whitespace()
            .any(|class| class == div_class)
            .then(|| caps.get(0).map(|m| m.end()))
            .flatten()
    })?;

    P_RE.captures_iter(&html[div_start..]).find_map(|caps| {
        let text = strip_tags(&caps[1]);
        text.find(prefix)
            .map(|pos| text[pos + prefix.len()..].trim().to_string())
    })
}

/// Body rows of the `<table>` with the given id; `None` when no such table exists
///
/// Rows without any `<td>` (header rows rendered with `<th>`) are skipped.
pub fn table_rows(html: &str, table_id: &str) -> Option<Vec<HtmlRow>> {
    let table = TABLE_RE.captures_iter(html).find_map(|caps| {
        let id = attribute(caps.get(1)?.as_str(), "id")?;
        (id == table_id).then(|| caps.get(2)).flatten()
    })?;

    let body = TBODY_RE
        .captures(table.as_str())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(table.as_str());

    let rows = TR_RE
        .captures_iter(body)
        .map(|tr| {
            let cells = TD_RE
                .captures_iter(&tr[1])
                .map(|td| {
                    let inner = &td[1];
                    let hrefs = ANCHOR_RE
                        .captures_iter(inner)
                        .filter_map(|a| attribute(&a[1], "href").map(normalize_entities))
                        .collect();
                    HtmlCell {
                        text: strip_tags(inner),
                        hrefs,
                    }
                })
                .collect::<Vec<_>>();
            HtmlRow { cells }
        })
        .filter(|row| !row.cells.is_empty())
        .collect();

    Some(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATION_PAGE: &str = r#"
<html><body>
<table id="table_10" class="table"><tbody><tr><td>decoy</td></tr></tbody></table>
<table id="table_1" class="table">
  <thead><tr><th>Date</th><th>Flow</th><th></th></tr></thead>
  <tbody>
    <tr>
      <td>2023-05-01 10:15</td>
      <td>1.25</td>
      <td><a href="/measurement/101/update">Edit</a> <a href='/measurement/101/csv-download'>CSV</a></td>
    </tr>
    <TR><TD>2023-05-02
        11:30</TD><TD>0.8</TD><TD></TD></TR>
  </tbody>
</table>
</body></html>"#;

    #[test]
    fn test_table_rows_by_id() {
        let rows = table_rows(STATION_PAGE, "table_1").unwrap();
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].first_cell_text(), Some("2023-05-01 10:15"));
        let hrefs: Vec<&str> = rows[0].hrefs().collect();
        assert_eq!(
            hrefs,
            vec!["/measurement/101/update", "/measurement/101/csv-download"]
        );

        assert_eq!(rows[1].first_cell_text(), Some("2023-05-02 11:30"));
        assert_eq!(rows[1].hrefs().count(), 0);
    }

    #[test]
    fn test_table_id_is_matched_exactly() {
        let rows = table_rows(STATION_PAGE, "table_10").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].first_cell_text(), Some("decoy"));
        assert!(table_rows(STATION_PAGE, "table_2").is_none());
    }

    #[test]
    fn test_input_value() {
        let html = r#"<form><input type="hidden" name="csrfmiddlewaretoken" value="abc123XYZ">
            <input name="login"></form>"#;
        assert_eq!(
            input_value(html, "csrfmiddlewaretoken"),
            Some("abc123XYZ".to_string())
        );
        assert_eq!(input_value(html, "login"), None);
        assert_eq!(input_value(html, "missing"), None);
    }

    #[test]
    fn test_list_item_marker() {
        let html = "<ul class=\"messages\"><li class=\"success\">\n  Successfully signed in as tech.\n</li></ul>";
        assert!(has_list_item_containing(html, "Successfully signed in"));
        assert!(!has_list_item_containing(html, "Invalid password"));
    }

    #[test]
    fn test_paragraph_after_div() {
        let html = r#"<div class="nav"><p>Salt Portal 0.0.1</p></div>
            <div class="wh-sidenav wh-sidenav-content"><ul></ul><p> Salt Portal 2.14.3 </p></div>"#;
        assert_eq!(
            paragraph_after_div(html, "wh-sidenav-content", "Salt Portal "),
            Some("2.14.3".to_string())
        );
        assert_eq!(paragraph_after_div(html, "absent", "Salt Portal "), None);
    }

    #[test]
    fn test_strip_tags_decodes_entities() {
        assert_eq!(strip_tags("<b>A &amp; B</b>&nbsp; C"), "A & B C");
    }
}

//! Marker-based extraction for the fixed Naver Finance markup.
//!
//! This is not a general HTML parser. The pages involved are stable,
//! machine-generated, lowercase markup, so targeted scanning is enough
//! and keeps the failure modes obvious.

/// Returns the value of `attr` on the element carrying `id="<id>"`.
pub fn element_attr(html: &str, id: &str, attr: &str) -> Option<String> {
    let marker = format!("id=\"{id}\"");
    let pos = html.find(&marker)?;
    let tag_start = html[..pos].rfind('<')?;
    let tag_end = pos + html[pos..].find('>')?;
    find_attr(&html[tag_start..tag_end], attr)
}

/// Extracts `name="value"` (or single-quoted) from one tag's text.
pub fn find_attr(tag: &str, name: &str) -> Option<String> {
    let marker = format!("{name}=");
    let pos = tag.find(&marker)? + marker.len();
    let rest = &tag[pos..];
    let quote = rest.chars().next()?;
    if quote != '"' && quote != '\'' {
        return None;
    }
    let rest = &rest[1..];
    let end = rest.find(quote)?;
    Some(rest[..end].to_string())
}

/// Inner markup of the element with `id="<id>"`, up to `end_marker`.
pub fn element_inner<'a>(html: &'a str, id: &str, end_marker: &str) -> Option<&'a str> {
    let marker = format!("id=\"{id}\"");
    let pos = html.find(&marker)?;
    let open_end = pos + html[pos..].find('>')? + 1;
    let close = open_end + html[open_end..].find(end_marker)?;
    Some(&html[open_end..close])
}

/// Removes every block whose opening tag mentions `class_marker`, through
/// the next `end_tag`. Used to drop related-article link lists before
/// collecting hrefs.
pub fn strip_blocks(html: &str, class_marker: &str, end_tag: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(pos) = rest.find(class_marker) {
        let block_start = rest[..pos].rfind('<').unwrap_or(pos);
        out.push_str(&rest[..block_start]);
        match rest[pos..].find(end_tag) {
            Some(end) => rest = &rest[pos + end + end_tag.len()..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

/// All `href` attribute values, in document order.
pub fn collect_hrefs(html: &str) -> Vec<String> {
    let mut hrefs = Vec::new();
    let mut rest = html;
    while let Some(pos) = rest.find("href=") {
        rest = &rest[pos..];
        if let Some(href) = find_attr(rest, "href") {
            hrefs.push(href);
        }
        rest = &rest[5..];
    }
    hrefs
}

/// Fragments between `<open ...>` and `</close>` pairs, e.g. table rows.
pub fn blocks_between<'a>(fragment: &'a str, open: &str, close: &str) -> Vec<&'a str> {
    let mut out = Vec::new();
    let mut rest = fragment;
    loop {
        let start = match rest.find(open) {
            Some(pos) => pos,
            None => break,
        };
        let after_open = &rest[start..];
        let content_start = match after_open.find('>') {
            Some(pos) => start + pos + 1,
            None => break,
        };
        let content_end = match rest[content_start..].find(close) {
            Some(pos) => content_start + pos,
            None => break,
        };
        out.push(&rest[content_start..content_end]);
        rest = &rest[content_end + close.len()..];
    }
    out
}

/// Plain text of a markup fragment: script/style/table blocks dropped,
/// `<br>` turned into line breaks, remaining tags removed, entities
/// decoded, blank lines collapsed.
pub fn strip_tags(fragment: &str) -> String {
    let mut cleaned = fragment.to_string();
    for (open, close) in [
        ("<script", "</script>"),
        ("<style", "</style>"),
        ("<table", "</table>"),
    ] {
        cleaned = drop_container(&cleaned, open, close);
    }

    for br in ["<br>", "<br/>", "<br />"] {
        cleaned = cleaned.replace(br, "\n");
    }

    let mut text = String::with_capacity(cleaned.len());
    let mut in_tag = false;
    for ch in cleaned.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }

    let decoded = decode_entities(&text);
    decoded
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn drop_container(html: &str, open: &str, close: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(start) = rest.find(open) {
        out.push_str(&rest[..start]);
        match rest[start..].find(close) {
            Some(end) => rest = &rest[start + end + close.len()..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

pub fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#039;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_attr_reads_iframe_src() {
        let html = r#"<div><iframe id="news_frame" src="/item/news_news.naver?code=005930" title="뉴스"></iframe></div>"#;
        assert_eq!(
            element_attr(html, "news_frame", "src").as_deref(),
            Some("/item/news_news.naver?code=005930")
        );
        assert_eq!(element_attr(html, "missing", "src"), None);
    }

    #[test]
    fn element_inner_slices_to_end_marker() {
        let html = r#"<article id="dic_area" class="go">body <b>text</b></article><footer>"#;
        assert_eq!(
            element_inner(html, "dic_area", "</article>"),
            Some("body <b>text</b>")
        );
    }

    #[test]
    fn strip_blocks_removes_marked_lists() {
        let html = r#"<a href="/keep">k</a><ul class="relation_lst"><a href="/drop">d</a></ul><a href="/keep2">k2</a>"#;
        let cleaned = strip_blocks(html, "relation_lst", "</ul>");
        assert!(cleaned.contains("/keep"));
        assert!(cleaned.contains("/keep2"));
        assert!(!cleaned.contains("/drop"));
    }

    #[test]
    fn collect_hrefs_preserves_document_order() {
        let html = r#"<a href="/a">1</a><a class="x" href='/b'>2</a>"#;
        assert_eq!(collect_hrefs(html), vec!["/a".to_string(), "/b".to_string()]);
    }

    #[test]
    fn blocks_between_returns_row_fragments() {
        let html = "<tr><td>a</td></tr><tr class=\"odd\"><td>b</td></tr>";
        let rows = blocks_between(html, "<tr", "</tr>");
        assert_eq!(rows, vec!["<td>a</td>", "<td>b</td>"]);
    }

    #[test]
    fn strip_tags_drops_scripts_and_decodes_entities() {
        let html = "intro<script>var x = 1;</script><br>line&nbsp;two &amp; three<table><tr><td>skip</td></tr></table>";
        assert_eq!(strip_tags(html), "intro\nline two & three");
    }
}

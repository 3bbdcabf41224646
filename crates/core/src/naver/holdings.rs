//! Foreign/institutional trading table scrape.

use anyhow::ensure;

use super::html;
use super::{NaverClient, OwnershipRow};

const EP_HOLDINGS: &str = "naver.holdings";

/// Summary attribute text identifying the trading table on the page.
const TABLE_MARKER: &str = "외국인 기관 순매매 거래량";

impl NaverClient {
    pub(crate) async fn fetch_ownership_rows(&self, code: &str) -> anyhow::Result<Vec<OwnershipRow>> {
        let code = code.trim();
        ensure!(
            !code.is_empty() && code.bytes().all(|b| b.is_ascii_digit()),
            "invalid krx code for holdings lookup: {code:?}"
        );
        let url = format!("{}/item/frgn.naver?code={code}&page=1", self.base_url());
        let page = self.fetch_page(EP_HOLDINGS, &url, None).await?;
        Ok(parse_holdings_table(&page))
    }
}

/// Parses rows out of the table whose summary mentions the trading
/// marker. Only rows with exactly nine data cells are kept, which
/// skips headers and layout spacers.
pub(crate) fn parse_holdings_table(page: &str) -> Vec<OwnershipRow> {
    let table = match table_with_summary(page, TABLE_MARKER) {
        Some(table) => table,
        None => return Vec::new(),
    };

    let mut rows = Vec::new();
    for row in html::blocks_between(table, "<tr", "</tr>") {
        let cells: Vec<String> = html::blocks_between(row, "<td", "</td>")
            .into_iter()
            .map(html::strip_tags)
            .collect();
        if cells.len() != 9 {
            continue;
        }
        rows.push(OwnershipRow {
            date: cells[0].clone(),
            close: parse_table_num(&cells[1]),
            change: parse_change(&cells[2]),
            change_rate: parse_table_num(&cells[3].replace('%', "")),
            volume: parse_table_num(&cells[4]),
            institutional_net: parse_table_num(&cells[5]),
            foreign_net: parse_table_num(&cells[6]),
            foreign_shares: parse_table_num(&cells[7]),
            foreign_ownership: parse_table_num(&cells[8].replace('%', "")),
        });
    }
    rows
}

fn table_with_summary<'a>(page: &'a str, marker: &str) -> Option<&'a str> {
    let pos = page.find(marker)?;
    let start = page[..pos].rfind("<table")?;
    let end = pos + page[pos..].find("</table>")?;
    Some(&page[start..end])
}

/// Numeric table cell: separators and plus signs dropped, blank and
/// dash cells become `None`.
pub(crate) fn parse_table_num(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|ch| !matches!(ch, ',' | '+') && !ch.is_whitespace())
        .collect();
    if cleaned.is_empty() || cleaned == "-" {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Daily-change cell. The direction arrow is rendered as hidden text,
/// so 상승 marks a gain and 하락 a loss.
pub(crate) fn parse_change(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.contains("상승") {
        return parse_table_num(&digits_and_dots(trimmed));
    }
    if trimmed.contains("하락") {
        return parse_table_num(&format!("-{}", digits_and_dots(trimmed)));
    }
    let kept: String = trimmed
        .chars()
        .filter(|ch| ch.is_ascii_digit() || matches!(ch, '.' | '-'))
        .collect();
    parse_table_num(&kept)
}

fn digits_and_dots(text: &str) -> String {
    text.chars()
        .filter(|ch| ch.is_ascii_digit() || *ch == '.')
        .collect()
}

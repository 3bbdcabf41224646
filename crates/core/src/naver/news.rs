//! Per-symbol news crawl: board page, news iframe, then each article.

use anyhow::ensure;

use super::html;
use super::{NaverClient, NewsArticle};

const EP_NEWS_BOARD: &str = "naver.news_board";
const EP_NEWS_FRAME: &str = "naver.news_frame";
const EP_ARTICLE: &str = "naver.news_article";

const ARTICLE_HOST_PREFIX: &str = "https://n.news.naver.com/mnews/article";
const READ_PATH_PREFIX: &str = "/item/news_read.naver";

/// Upper bound on crawled article bodies per symbol.
const MAX_ARTICLES: usize = 5;

impl NaverClient {
    pub(crate) async fn fetch_news_articles(&self, code: &str) -> anyhow::Result<Vec<NewsArticle>> {
        let code = code.trim();
        ensure!(
            !code.is_empty() && code.bytes().all(|b| b.is_ascii_digit()),
            "invalid krx code for news lookup: {code:?}"
        );

        let board_url = format!("{}/item/news.naver?code={code}&page=1", self.base_url());
        let board = self.fetch_page(EP_NEWS_BOARD, &board_url, None).await?;

        // The board embeds the actual list in an iframe. No iframe means
        // no news board for this symbol.
        let frame_src = match html::element_attr(&board, "news_frame", "src") {
            Some(src) => html::decode_entities(&src),
            None => return Ok(Vec::new()),
        };
        let frame_url = resolve_href(self.base_url(), &with_page_param(&frame_src));
        let frame = self
            .fetch_page(EP_NEWS_FRAME, &frame_url, Some(&board_url))
            .await?;

        // Related-article sidebars repeat links already in the main list.
        let cleaned = html::strip_blocks(&frame, "relation_lst", "</ul>");
        let links = collect_article_links(&cleaned, self.base_url());

        let mut articles = Vec::new();
        for url in links.into_iter().take(MAX_ARTICLES) {
            match self.fetch_article(&url).await {
                Ok(article) => articles.push(article),
                Err(err) => {
                    tracing::warn!(url = %url, error = %err, "failed to crawl news article, skipping");
                }
            }
        }
        Ok(articles)
    }

    async fn fetch_article(&self, url: &str) -> anyhow::Result<NewsArticle> {
        let resolved = resolve_article_url(url);
        let page = self.fetch_page(EP_ARTICLE, &resolved, None).await?;
        Ok(build_article(resolved, &page))
    }
}

/// Keeps article hrefs, absolutizes the finance-hosted read links, and
/// dedups while preserving first-seen order.
fn collect_article_links(html_fragment: &str, finance_base: &str) -> Vec<String> {
    let mut links = Vec::new();
    for href in html::collect_hrefs(html_fragment) {
        let href = html::decode_entities(&href);
        let absolute = if href.starts_with(ARTICLE_HOST_PREFIX) {
            href
        } else if href.starts_with(READ_PATH_PREFIX) {
            format!("{finance_base}{href}")
        } else {
            continue;
        };
        if !links.contains(&absolute) {
            links.push(absolute);
        }
    }
    links
}

/// Old-style read links redirect through an interstitial; jumping
/// straight to the article host skips it.
fn resolve_article_url(url: &str) -> String {
    if url.contains("news_read.naver") {
        let aid = query_param(url, "article_id");
        let oid = query_param(url, "office_id");
        if let (Some(aid), Some(oid)) = (aid, oid) {
            if !aid.is_empty() && !oid.is_empty() {
                return format!("https://n.news.naver.com/mnews/article/{oid}/{aid}");
            }
        }
    }
    url.to_string()
}

fn with_page_param(src: &str) -> String {
    if src.contains("page=") {
        src.to_string()
    } else {
        format!("{src}&page=1")
    }
}

fn resolve_href(base: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    if let Some(rest) = href.strip_prefix("//") {
        return format!("https://{rest}");
    }
    if href.starts_with('/') {
        return format!("{base}{href}");
    }
    format!("{base}/item/{href}")
}

fn query_param(url: &str, name: &str) -> Option<String> {
    let query = url.split_once('?')?.1;
    for pair in query.split('&') {
        let (key, value) = match pair.split_once('=') {
            Some(split) => split,
            None => (pair, ""),
        };
        if key == name {
            return Some(value.to_string());
        }
    }
    None
}

fn build_article(url: String, page: &str) -> NewsArticle {
    let title = extract_title(page);
    let content = match html::element_inner(page, "dic_area", "</article>") {
        Some(inner) => html::strip_tags(inner),
        None => String::new(),
    };
    NewsArticle { url, title, content }
}

fn extract_title(page: &str) -> String {
    let inner = match html::element_inner(page, "title_area", "</h2>") {
        Some(inner) => inner,
        None => return String::new(),
    };
    let spans = html::blocks_between(inner, "<span", "</span>");
    if !spans.is_empty() {
        let text = html::strip_tags(&spans.join(""));
        if !text.is_empty() {
            return text;
        }
    }
    html::strip_tags(inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_article_links_filters_absolutizes_and_dedups() {
        let fragment = concat!(
            r#"<a href="https://n.news.naver.com/mnews/article/001/0001">a</a>"#,
            r#"<a href="/item/news_read.naver?article_id=0002&amp;office_id=015">b</a>"#,
            r#"<a href="https://n.news.naver.com/mnews/article/001/0001">dup</a>"#,
            r#"<a href="/item/main.naver">other</a>"#,
        );
        let links = collect_article_links(fragment, "https://finance.naver.com");
        assert_eq!(
            links,
            vec![
                "https://n.news.naver.com/mnews/article/001/0001".to_string(),
                "https://finance.naver.com/item/news_read.naver?article_id=0002&office_id=015"
                    .to_string(),
            ]
        );
    }

    #[test]
    fn resolve_article_url_maps_read_links_to_article_host() {
        let url = "https://finance.naver.com/item/news_read.naver?article_id=0005432109&office_id=015&page=1";
        assert_eq!(
            resolve_article_url(url),
            "https://n.news.naver.com/mnews/article/015/0005432109"
        );
    }

    #[test]
    fn resolve_article_url_leaves_other_links_alone() {
        let direct = "https://n.news.naver.com/mnews/article/001/0001";
        assert_eq!(resolve_article_url(direct), direct);

        let partial = "https://finance.naver.com/item/news_read.naver?article_id=0001";
        assert_eq!(resolve_article_url(partial), partial);
    }

    #[test]
    fn with_page_param_appends_only_when_missing() {
        assert_eq!(
            with_page_param("/item/news_news.naver?code=005930"),
            "/item/news_news.naver?code=005930&page=1"
        );
        assert_eq!(
            with_page_param("/item/news_news.naver?code=005930&page=3"),
            "/item/news_news.naver?code=005930&page=3"
        );
    }

    #[test]
    fn resolve_href_handles_each_shape() {
        let base = "https://finance.naver.com";
        assert_eq!(resolve_href(base, "https://x.test/a"), "https://x.test/a");
        assert_eq!(
            resolve_href(base, "//n.news.naver.com/a"),
            "https://n.news.naver.com/a"
        );
        assert_eq!(
            resolve_href(base, "/item/news_news.naver?code=1"),
            "https://finance.naver.com/item/news_news.naver?code=1"
        );
        assert_eq!(
            resolve_href(base, "news_news.naver?code=1"),
            "https://finance.naver.com/item/news_news.naver?code=1"
        );
    }

    #[test]
    fn build_article_extracts_title_and_cleaned_body() {
        let page = concat!(
            r#"<h2 id="title_area" class="media_end_head_headline"><span>삼성전자, 신제품 공개</span></h2>"#,
            r#"<article id="dic_area" class="go_trans">"#,
            "본문 첫 줄<br>",
            "<script>tracker();</script>",
            "<table><tr><td>표 내용</td></tr></table>",
            "  둘째 줄  ",
            "</article>",
        );
        let article = build_article("https://n.news.naver.com/mnews/article/001/0001".into(), page);
        assert_eq!(article.title, "삼성전자, 신제품 공개");
        assert_eq!(article.content, "본문 첫 줄\n둘째 줄");
    }

    #[test]
    fn build_article_without_body_keeps_title_and_empty_content() {
        let page = r#"<h2 id="title_area">영상 기사</h2><div>video player</div>"#;
        let article = build_article("https://n.news.naver.com/mnews/article/001/0002".into(), page);
        assert_eq!(article.title, "영상 기사");
        assert_eq!(article.content, "");
    }

    #[test]
    fn extract_title_falls_back_to_heading_text() {
        let page = r#"<h2 id="title_area">제목 그대로</h2>"#;
        assert_eq!(extract_title(page), "제목 그대로");
    }
}

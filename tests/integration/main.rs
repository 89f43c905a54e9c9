mod pagination;
mod storage;

use imoscout_core::{CrawlSettings, SiteSettings, StopPolicy};
use imoscout_scrapers::ScrapeQuery;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TYPOLOGY: &str = "apartamento";

/// Crawl settings with no politeness delay so tests run instantly.
pub fn crawl_settings(use_page_count: bool, policy: StopPolicy) -> CrawlSettings {
    CrawlSettings {
        request_delay_ms: 0,
        use_page_count,
        stop_policy: policy,
        ..CrawlSettings::default()
    }
}

pub fn site_settings(server: &MockServer) -> SiteSettings {
    SiteSettings {
        base_url: format!("{}/comprar/", server.uri()),
        search: Some("/?page=".to_string()),
        typologies: vec![TYPOLOGY.to_string()],
    }
}

pub fn query(server: &MockServer) -> ScrapeQuery {
    ScrapeQuery::from_site(&site_settings(server), TYPOLOGY)
}

pub fn listing_page(cards: &[(&str, &str)], pager: Option<&[&str]>) -> String {
    let mut body = String::from("<html><body><main>");
    for (title, href) in cards {
        body.push_str(&format!(
            r#"<article class="offer-item"><a href="{}"><span class="offer-item-title">{}</span></a></article>"#,
            href, title
        ));
    }
    if let Some(items) = pager {
        body.push_str(r#"<ul class="pager"><li class="pager-prev">«</li>"#);
        for item in items {
            body.push_str(&format!("<li>{}</li>", item));
        }
        body.push_str(r#"<li class="pager-next">»</li></ul>"#);
    }
    body.push_str("</main></body></html>");
    body
}

pub fn detail_page(address: &str, price: &str, attributes: &[(&str, &str)]) -> String {
    let facts: String = attributes
        .iter()
        .map(|(label, value)| {
            format!(
                r#"<div class="css-o4i8bk e1qm3vsd1">{}:</div><div class="css-1ytkscc e1qm3vsd3">{}</div>"#,
                label, value
            )
        })
        .collect();
    format!(
        r#"<html><body>
            <div class="css-z9gx1y e3ustps0">{}</div>
            <strong class="css-t3wmkv e1l1avn10">{}</strong>
            <div class="css-1h1l5lm efcnut39">2 000 €/m²</div>
            <section>{}</section>
        </body></html>"#,
        address, price, facts
    )
}

pub async fn mount_listing_page(server: &MockServer, page: u32, body: String) {
    Mock::given(method("GET"))
        .and(path(format!("/comprar/{}/", TYPOLOGY)))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

pub async fn mount_detail_page(server: &MockServer, detail_path: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(detail_path))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

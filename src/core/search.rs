use crate::config::PortalConfig;
use crate::domain::model::{GazetteRecord, SearchCriteria, SearchOutcome, UNKNOWN_DATE};
use crate::domain::ports::PortalTransport;
use crate::utils::error::Result;
use crate::utils::html::clean_html_text;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

static ROW_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?si)<tr[^>]*>(.*?)</tr>").expect("row regex is hardcoded and valid"));

// 辦事處 | 登記號 | 商號 | 日期 | 期數 | 頁數 | 公告類型 | IlanIdG<id> + 文件連結
static CELLS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r#"(?si)^\s*<td[^>]*>(?P<office>.*?)</td>"#,
        r#"\s*<td[^>]*>(?P<number>.*?)</td>"#,
        r#"\s*<td[^>]*>(?P<title>.*?)</td>"#,
        r#"\s*<td[^>]*>(?P<date>.*?)</td>"#,
        r#"\s*<td[^>]*>(?P<issue>.*?)</td>"#,
        r#"\s*<td[^>]*>(?P<page>.*?)</td>"#,
        r#"\s*<td[^>]*>(?P<kind>.*?)</td>"#,
        r#"\s*<td[^>]*id=["']IlanIdG(?P<id>[^"']*)["'][^>]*>\s*<a[^>]*href=["'](?P<path>[^"']*)["']"#,
    ))
    .expect("cell regex is hardcoded and valid")
});

static DATE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{2}\.\d{2}\.\d{4}").expect("date regex is hardcoded and valid"));

static COUNT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\(\s*(\d+)\s*Adet\s*\)").expect("count regex is hardcoded and valid"));

/// Submits search criteria to the portal and parses the result table.
pub struct SearchEngine {
    transport: Arc<dyn PortalTransport>,
    config: PortalConfig,
}

impl SearchEngine {
    pub fn new(config: &PortalConfig, transport: Arc<dyn PortalTransport>) -> Self {
        Self {
            transport,
            config: config.clone(),
        }
    }

    /// One search round-trip; `SessionExpired` propagates to the retry wrapper.
    pub async fn search(&self, criteria: &SearchCriteria) -> Result<SearchOutcome> {
        tracing::info!(
            "Searching gazette announcements (name='{}', number='{}', office='{}')",
            criteria.company_name,
            criteria.register_number,
            criteria.register_office
        );

        let fields = [
            ("SicilMudurluguId", criteria.register_office.as_str()),
            ("TicSicNo", criteria.register_number.as_str()),
            ("TicaretUnvani", criteria.company_name.as_str()),
        ];
        let response = self
            .transport
            .post_multipart(&self.config.portal.search_path, &fields)
            .await?;

        tracing::debug!("Search response: {} bytes from {}", response.body.len(), response.final_url);
        Ok(parse_gazettes(&response.body, &self.config))
    }
}

/// Parses the portal's result table.
///
/// Rows that do not match the expected markup are skipped; when the page's
/// count header announces more rows than were parsed the outcome is flagged
/// partial.
pub fn parse_gazettes(html: &str, config: &PortalConfig) -> SearchOutcome {
    let records: Vec<GazetteRecord> = ROW_PATTERN
        .captures_iter(html)
        .filter_map(|row| parse_row(&row[1], config))
        .collect();

    let reported_total = COUNT_PATTERN
        .captures(html)
        .and_then(|caps| caps[1].parse::<usize>().ok());

    let partial = match reported_total {
        Some(total) => {
            tracing::info!("Portal reports {} announcements, parsed {}", total, records.len());
            if records.len() < total {
                tracing::warn!(
                    "Parsed fewer rows ({}) than the portal announced ({}); result markup may have changed",
                    records.len(),
                    total
                );
            }
            records.len() < total
        }
        None => {
            tracing::info!("Parsed {} announcements (no count header)", records.len());
            false
        }
    };

    let undated = records.iter().filter(|r| !r.has_known_date()).count();
    if undated > 0 {
        tracing::warn!("{} announcements carry an unparseable publication date", undated);
    }

    SearchOutcome {
        records,
        reported_total,
        partial,
    }
}

fn parse_row(row: &str, config: &PortalConfig) -> Option<GazetteRecord> {
    let caps = CELLS_PATTERN.captures(row)?;
    let field = |name: &str| caps.name(name).map(|m| clean_html_text(m.as_str())).unwrap_or_default();

    let date_cell = field("date");
    let publication_date = DATE_PATTERN
        .find(&date_cell)
        .map(|m| m.as_str().to_string())
        .unwrap_or(date_cell);
    let publish_date = parse_publication_date(&publication_date);

    let pdf_url = field("path");
    let visit_url = config.visit_url(&pdf_url);

    Some(GazetteRecord {
        register_office: field("office"),
        register_number: field("number"),
        company_title: field("title"),
        publication_date,
        publish_date,
        issue_number: field("issue"),
        page_number: field("page"),
        announcement_type: field("kind"),
        pdf_url,
        visit_url,
        announcement_id: field("id"),
    })
}

/// `dd.mm.yyyy`; anything else becomes [`UNKNOWN_DATE`].
pub fn parse_publication_date(raw: &str) -> NaiveDate {
    match NaiveDate::parse_from_str(raw.trim(), "%d.%m.%Y") {
        Ok(date) => date,
        Err(_) => {
            tracing::warn!("Unparseable publication date '{}', using sentinel", raw);
            UNKNOWN_DATE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{test_config, ScriptedPortal, EXPIRED_MARKER, SEARCH_PATH};
    use crate::utils::error::SicilError;

    fn row(date: &str, id: &str, path: &str) -> String {
        format!(
            r#"<tr>
                <td>İSTANBUL</td>
                <td class="text-center">1000-0</td>
                <td><b>ACME</b> TİCARET&nbsp;A.Ş.</td>
                <td class="text-center">
                    {date} <br/><small>Pazartesi</small></td>
                <td class="text-center">10741</td>
                <td class="text-center"> 512 </td>
                <td class="text-center">Kuruluş</td>
                <td class="text-center" id="IlanIdG{id}">
                    <a href="{path}" target="_blank"><i class="fa fa-file-pdf-o"></i></a>
                </td>
            </tr>"#
        )
    }

    fn page(rows: &[String], count: Option<usize>) -> String {
        let header = count
            .map(|n| format!("<h4>Yayınlanmış Türkiye Ticaret Sicili Gazetesi İlanları ({} Adet)</h4>", n))
            .unwrap_or_default();
        format!(
            r#"<div>{}</div><table class="table">
                <thead><tr><th>Müdürlük</th><th>Sicil No</th><th>Ünvan</th><th>Tarih</th>
                <th>Sayı</th><th>Sayfa</th><th>Tür</th><th></th></tr></thead>
                <tbody>{}</tbody></table>"#,
            header,
            rows.join("\n")
        )
    }

    #[test]
    fn test_parse_row_fields() {
        let html = page(&[row("01.02.2023", "88412", "ilan_goruntule.php?Guid=a1&amp;t=2")], Some(1));

        let outcome = parse_gazettes(&html, &test_config());

        assert_eq!(outcome.records.len(), 1);
        assert!(!outcome.partial);
        assert_eq!(outcome.reported_total, Some(1));

        let record = &outcome.records[0];
        assert_eq!(record.register_office, "İSTANBUL");
        assert_eq!(record.register_number, "1000-0");
        assert_eq!(record.company_title, "ACME TİCARET A.Ş.");
        assert_eq!(record.publication_date, "01.02.2023");
        assert_eq!(record.publish_date, NaiveDate::from_ymd_opt(2023, 2, 1).unwrap());
        assert_eq!(record.issue_number, "10741");
        assert_eq!(record.page_number, "512");
        assert_eq!(record.announcement_type, "Kuruluş");
        assert_eq!(record.announcement_id, "88412");
        assert_eq!(record.pdf_url, "ilan_goruntule.php?Guid=a1&t=2");
        assert_eq!(
            record.visit_url,
            "https://www.ticaretsicil.gov.tr/view/hizlierisim/ilan_goruntule.php?Guid=a1&t=2"
        );
    }

    #[test]
    fn test_malformed_date_uses_sentinel_and_keeps_row() {
        let html = page(
            &[
                row("2023-02-01", "1", "a.php"),
                row("31.02.2023", "2", "b.php"),
                row("15.06.2021", "3", "c.php"),
            ],
            Some(3),
        );

        let outcome = parse_gazettes(&html, &test_config());

        assert_eq!(outcome.records.len(), 3);
        assert_eq!(outcome.records[0].publish_date, UNKNOWN_DATE);
        assert!(outcome.records[0].publication_date.starts_with("2023-02-01"));
        assert_eq!(outcome.records[0].register_number, "1000-0");
        assert!(!outcome.records[1].has_known_date());
        assert_eq!(
            outcome.records[2].publish_date,
            NaiveDate::from_ymd_opt(2021, 6, 15).unwrap()
        );
    }

    #[test]
    fn test_unmatched_rows_are_skipped_and_flagged_partial() {
        let broken = r#"<tr><td>ANKARA</td><td>55</td><td>BROKEN LTD</td></tr>"#.to_string();
        let html = page(&[row("01.02.2023", "1", "a.php"), broken], Some(2));

        let outcome = parse_gazettes(&html, &test_config());

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.reported_total, Some(2));
        assert!(outcome.partial);
    }

    #[test]
    fn test_empty_result_page() {
        let outcome = parse_gazettes("<p>Kayıt bulunamadı</p>", &test_config());
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.reported_total, None);
        assert!(!outcome.partial);
    }

    #[test]
    fn test_parse_publication_date() {
        assert_eq!(
            parse_publication_date(" 01.02.2023 "),
            NaiveDate::from_ymd_opt(2023, 2, 1).unwrap()
        );
        assert_eq!(parse_publication_date(""), UNKNOWN_DATE);
        assert_eq!(parse_publication_date("1.2.23x"), UNKNOWN_DATE);
    }

    #[tokio::test]
    async fn test_search_posts_criteria_fields() {
        let portal = Arc::new(ScriptedPortal::new());
        portal.post(SEARCH_PATH, &page(&[row("01.02.2023", "7", "x.php")], Some(1)));
        let engine = SearchEngine::new(&test_config(), portal.clone());

        let outcome = engine
            .search(&SearchCriteria::new("ACME", "1000-0", "ISTANBUL"))
            .await
            .unwrap();

        assert_eq!(outcome.records.len(), 1);
        let fields = portal.posted_fields(SEARCH_PATH);
        assert_eq!(
            fields[0],
            vec![
                ("SicilMudurluguId".to_string(), "ISTANBUL".to_string()),
                ("TicSicNo".to_string(), "1000-0".to_string()),
                ("TicaretUnvani".to_string(), "ACME".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_search_surfaces_session_expiry() {
        let portal = Arc::new(ScriptedPortal::new());
        portal.post(SEARCH_PATH, &format!("<div>Lütfen {}.</div>", EXPIRED_MARKER));
        let engine = SearchEngine::new(&test_config(), portal);

        let err = engine.search(&SearchCriteria::default()).await.unwrap_err();
        assert!(matches!(err, SicilError::SessionExpired));
    }
}

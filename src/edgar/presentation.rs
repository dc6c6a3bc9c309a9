use log::{info, warn};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use reqwest::Client;
use std::collections::{HashMap, HashSet};
use url::Url;

use super::client::{fetch_json, fetch_text};
use crate::recon::error::ReconError;
use crate::recon::model::FilingMeta;

/// Everything the presentation linkbase contributes: where each concept is
/// presented, and which concepts the filer displays sign-reversed.
#[derive(Debug, Default, Clone)]
pub struct PresentationData {
    pub concept_roles: HashMap<String, Vec<String>>,
    pub negated_concepts: HashSet<String>,
}

fn attr_value(start: &BytesStart<'_>, name: &str) -> Option<String> {
    start.attributes().flatten().find_map(|a| {
        if a.key.as_ref() == name.as_bytes() {
            String::from_utf8(a.value.to_vec()).ok()
        } else {
            None
        }
    })
}

/// "http://…/role/StatementOfIncome" → "StatementOfIncome".
fn normalize_role_uri(uri: &str) -> Option<String> {
    uri.split_once("/role/").map(|(_, role)| role.to_string())
}

/// "…-20240630.xsd#us-gaap_Revenues" → "us-gaap:Revenues". Only the first
/// underscore separates prefix from name.
fn concept_from_href(href: &str) -> Option<String> {
    let fragment = href.rsplit('#').next()?;
    let (prefix, name) = fragment.split_once('_')?;
    Some(format!("{}:{}", prefix, name))
}

/// Parse a .pre.xml presentation linkbase. Each presentationLink scopes a
/// role; its loc elements map xlink labels to concepts, and its
/// presentationArc elements attach concepts to the role and, through
/// `preferredLabel`, mark the negated ones.
pub fn parse_presentation(content: &str) -> Result<PresentationData, ReconError> {
    let mut reader = Reader::from_str(content);
    let mut buf = Vec::new();

    let mut data = PresentationData::default();
    let mut current_role: Option<String> = None;
    let mut label_to_concept: HashMap<String, String> = HashMap::new();
    // (to-label, preferredLabel) pairs collected inside the current link.
    let mut arcs: Vec<(String, Option<String>)> = Vec::new();

    let mut flush_link = |role: &Option<String>,
                          labels: &mut HashMap<String, String>,
                          arcs: &mut Vec<(String, Option<String>)>,
                          data: &mut PresentationData| {
        for (to_label, preferred) in arcs.drain(..) {
            let concept = match labels.get(&to_label) {
                Some(concept) => concept.clone(),
                None => continue,
            };
            if let Some(role) = role {
                data.concept_roles.entry(concept.clone()).or_default().push(role.clone());
            }
            if preferred.map(|p| p.contains("negatedLabel")).unwrap_or(false) {
                data.negated_concepts.insert(concept);
            }
        }
        labels.clear();
    };

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|e| ReconError::BadResponse {
            context: "presentation linkbase".to_string(),
            detail: e.to_string(),
        })?;

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                match e.local_name().as_ref() {
                    b"presentationLink" => {
                        current_role = attr_value(e, "xlink:role")
                            .as_deref()
                            .and_then(normalize_role_uri);
                    }
                    b"loc" => {
                        let label = attr_value(e, "xlink:label");
                        let concept = attr_value(e, "xlink:href")
                            .as_deref()
                            .and_then(concept_from_href);
                        if let (Some(label), Some(concept)) = (label, concept) {
                            label_to_concept.insert(label, concept);
                        }
                    }
                    b"presentationArc" => {
                        if let Some(to_label) = attr_value(e, "xlink:to") {
                            arcs.push((to_label, attr_value(e, "preferredLabel")));
                        }
                    }
                    _ => {}
                }
            }
            Event::End(ref e) if e.local_name().as_ref() == b"presentationLink" => {
                flush_link(&current_role, &mut label_to_concept, &mut arcs, &mut data);
                current_role = None;
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    // Tolerate a linkbase that never closes its last link element.
    flush_link(&current_role, &mut label_to_concept, &mut arcs, &mut data);

    info!(
        "extracted {} concept-role mappings and {} negated concepts from presentation linkbase",
        data.concept_roles.len(),
        data.negated_concepts.len()
    );
    Ok(data)
}

#[derive(Debug, serde::Deserialize)]
struct AccessionIndex {
    directory: Directory,
}

#[derive(Debug, serde::Deserialize)]
struct Directory {
    #[serde(default)]
    item: Vec<Item>,
}

#[derive(Debug, serde::Deserialize)]
struct Item {
    name: String,
}

/// Locate and parse the .pre.xml file inside an accession. A filing
/// without one simply contributes no roles and no negated set, which is
/// common enough that it is a warning, not an error.
pub async fn fetch_presentation(
    client: &Client,
    meta: &FilingMeta,
    user_agent: &str,
) -> Result<PresentationData, ReconError> {
    let cik_unpadded = meta.cik.trim_start_matches('0');
    let acc_nodash = meta.accession.replace('-', "");
    let base = format!(
        "{}/Archives/edgar/data/{}/{}/",
        super::EDGAR_ARCHIVES_URL,
        cik_unpadded,
        acc_nodash
    );

    let index_url = Url::parse(&format!("{}index.json", base)).expect("valid index URL");
    let index: AccessionIndex = fetch_json(client, &index_url, user_agent).await?;

    let pre_file = index.directory.item.iter().find(|item| {
        let lower = item.name.to_lowercase();
        lower.contains("pre") && lower.ends_with(".xml")
    });
    let pre_file = match pre_file {
        Some(item) => &item.name,
        None => {
            warn!("no .pre.xml found for {}", meta.accession);
            return Ok(PresentationData::default());
        }
    };

    let pre_url = Url::parse(&format!("{}{}", base, pre_file)).expect("valid linkbase URL");
    info!("downloading presentation linkbase from {}", pre_url);
    let body = fetch_text(client, &pre_url, user_agent, mime::TEXT_XML).await?;
    parse_presentation(&body)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0"?>
<link:linkbase xmlns:link="http://www.xbrl.org/2003/linkbase" xmlns:xlink="http://www.w3.org/1999/xlink">
  <link:presentationLink xlink:role="http://example.com/role/StatementOfIncome">
    <link:loc xlink:href="aapl-20240630.xsd#us-gaap_Revenues" xlink:label="loc_rev"/>
    <link:loc xlink:href="aapl-20240630.xsd#us-gaap_PaymentsToAcquirePropertyPlantAndEquipment" xlink:label="loc_capex"/>
    <link:presentationArc xlink:from="loc_parent" xlink:to="loc_rev" preferredLabel="http://www.xbrl.org/2003/role/totalLabel"/>
    <link:presentationArc xlink:from="loc_parent" xlink:to="loc_capex" preferredLabel="http://www.xbrl.org/2009/role/negatedLabel"/>
  </link:presentationLink>
  <link:presentationLink xlink:role="http://example.com/role/BalanceSheet">
    <link:loc xlink:href="aapl-20240630.xsd#us-gaap_Revenues" xlink:label="loc_rev2"/>
    <link:presentationArc xlink:from="loc_parent" xlink:to="loc_rev2"/>
  </link:presentationLink>
</link:linkbase>"#;

    #[test]
    fn roles_are_scoped_per_link() {
        let data = parse_presentation(SAMPLE).unwrap();
        assert_eq!(
            data.concept_roles["us-gaap:Revenues"],
            vec!["StatementOfIncome".to_string(), "BalanceSheet".to_string()]
        );
    }

    #[test]
    fn negated_labels_collect_concepts() {
        let data = parse_presentation(SAMPLE).unwrap();
        assert!(data
            .negated_concepts
            .contains("us-gaap:PaymentsToAcquirePropertyPlantAndEquipment"));
        assert!(!data.negated_concepts.contains("us-gaap:Revenues"));
    }

    #[test]
    fn href_fragments_become_qnames() {
        assert_eq!(
            concept_from_href("x.xsd#us-gaap_OperatingExpenses"),
            Some("us-gaap:OperatingExpenses".to_string())
        );
        assert_eq!(concept_from_href("x.xsd#nounderscore"), None);
    }
}

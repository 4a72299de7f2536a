//! Claim extraction — raw document text → typed capability claims.
//!
//! Rule-based (regex) and fully deterministic: no wall-clock reads, no RNG.
//! Claim IDs are UUIDv5 over the owning document id and the claim fields, so
//! re-running extraction over identical bytes reproduces identical claims.
//!
//! Low-confidence extractions are emitted, never dropped — the configured
//! floor only marks them for downstream consumers. Unparseable input yields
//! an empty claim set and a non-fatal ingest error; the document itself
//! stays stored.

use chrono::NaiveDate;
use regex::Regex;
use signet_core::config::ExtractionConfig;
use signet_core::models::Document;
use signet_core::SignetError;
use uuid::Uuid;

/// A claim extracted from one document, before entity resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedClaim {
    pub id: Uuid,
    pub subject_entity: String,
    /// "technique" or "organization" — hint for entity creation.
    pub subject_kind: String,
    pub predicate: String,
    pub object_value: String,
    pub confidence: f64,
    pub asserted_date: NaiveDate,
}

/// Capitalized name run, up to four words: "TechniqueX", "Multi-Agent PPO".
const SUBJECT: &str = r"[A-Z][A-Za-z0-9-]*(?:\s+[A-Z][A-Za-z0-9-]*){0,3}";

/// Leading words that the subject regex over-captures at sentence starts.
const SUBJECT_STOPWORDS: &[&str] = &[
    "The", "This", "That", "These", "Those", "We", "Our", "It", "In", "On", "At", "A", "An",
    "As", "By", "For", "From", "Its",
];

struct PatternSpec {
    re: Regex,
    predicate: &'static str,
    kind: &'static str,
    confidence: f64,
}

/// Ordered pattern table. Confidence is fixed per pattern shape; dates come
/// from the surrounding sentence, falling back to document retrieval date.
fn patterns() -> Vec<PatternSpec> {
    let table: &[(&str, &str, &str, f64)] = &[
        // Capability assertions over techniques, by maturity of the verb.
        (
            r"(?:was\s+|were\s+|has\s+been\s+|have\s+been\s+|is\s+now\s+)?declared\s+operational\b(?:\s+(?:in|by|with|aboard)\s+(?P<object>[^.;\n]+))?",
            "operational",
            "technique",
            0.95,
        ),
        (
            r"(?:was\s+|were\s+|has\s+been\s+|have\s+been\s+|is\s+now\s+)?deployed\b(?:\s+(?:in|on|since|during|aboard|with)\s+(?P<object>[^.;\n]+))?",
            "deployed",
            "technique",
            0.9,
        ),
        (
            r"(?:was\s+|were\s+|has\s+been\s+|have\s+been\s+)?(?:flight-tested|field-tested|tested)\b(?:\s+(?:in|on|at|during|against)\s+(?P<object>[^.;\n]+))?",
            "tested",
            "technique",
            0.8,
        ),
        (
            r"(?:was\s+|were\s+|has\s+been\s+|have\s+been\s+)?demonstrated\b(?:\s+(?:in|on|at|during|against)\s+(?P<object>[^.;\n]+))?",
            "demonstrated",
            "technique",
            0.7,
        ),
        (
            r"(?:was\s+|were\s+)?(?:simulated|evaluated\s+in\s+simulation)\b(?:\s+(?:in|with|using)\s+(?P<object>[^.;\n]+))?",
            "simulated",
            "technique",
            0.5,
        ),
        (
            r"(?:is|was)\s+proposed\b(?:\s+(?:for|as)\s+(?P<object>[^.;\n]+))?",
            "published",
            "technique",
            0.4,
        ),
    ];

    let mut specs: Vec<PatternSpec> = table
        .iter()
        .map(|&(tail, predicate, kind, confidence)| PatternSpec {
            re: Regex::new(&format!(r"\b(?P<subject>{})\s+{}", SUBJECT, tail))
                .expect("static extraction pattern"),
            predicate,
            kind,
            confidence,
        })
        .collect();

    // "We propose TechniqueX ..." — subject follows the verb.
    specs.push(PatternSpec {
        re: Regex::new(&format!(
            r"\b[Ww]e\s+(?:propose|present|introduce)\s+(?P<subject>{})",
            SUBJECT
        ))
        .expect("static extraction pattern"),
        predicate: "published",
        kind: "technique",
        confidence: 0.4,
    });

    // Organizations announcing development work.
    specs.push(PatternSpec {
        re: Regex::new(&format!(
            r"\b(?P<subject>{}\s+(?:University|Institute|Laboratory|Academy|Corporation|Agency))\s+(?:reported|announced|unveiled|developed)\s+(?P<object>[^.;\n]+)",
            SUBJECT
        ))
        .expect("static extraction pattern"),
        predicate: "developed",
        kind: "organization",
        confidence: 0.6,
    });

    // Bare mentions. Deliberately below the default confidence floor:
    // emitted and persisted, only marked low-confidence downstream.
    specs.push(PatternSpec {
        re: Regex::new(&format!(
            r"\b(?P<subject>{})\s+(?P<object>algorithm|technique|framework|method|guidance law|controller)\b",
            SUBJECT
        ))
        .expect("static extraction pattern"),
        predicate: "referenced",
        kind: "technique",
        confidence: 0.2,
    });

    specs
}

/// Extract all claims from a stored document.
///
/// Deterministic: identical document bytes produce identical claims in
/// identical order across runs.
pub fn extract(
    document: &Document,
    config: &ExtractionConfig,
) -> Result<Vec<ExtractedClaim>, SignetError> {
    if document.raw_text.trim().is_empty() {
        return Err(SignetError::Ingest(format!(
            "document {} has no extractable text",
            document.id
        )));
    }

    let specs = patterns();
    let fallback_date = document.retrieved_at.date_naive();

    let mut claims = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for sentence in document.raw_text.split(['.', ';', '\n']) {
        let sentence_date = parse_asserted_date(sentence).unwrap_or(fallback_date);

        for spec in &specs {
            for caps in spec.re.captures_iter(sentence) {
                let subject = match normalize_subject(&caps["subject"]) {
                    Some(s) => s,
                    None => continue,
                };
                let object_value = caps
                    .name("object")
                    .map(|m| m.as_str().trim().to_string())
                    .unwrap_or_default();

                let id = claim_id(
                    &document.id,
                    &subject,
                    spec.predicate,
                    &object_value,
                    sentence_date,
                );
                if !seen.insert(id) {
                    continue;
                }

                if spec.confidence < config.min_confidence {
                    tracing::debug!(
                        subject = %subject,
                        predicate = spec.predicate,
                        confidence = spec.confidence,
                        "Low-confidence claim emitted"
                    );
                }

                claims.push(ExtractedClaim {
                    id,
                    subject_entity: subject,
                    subject_kind: spec.kind.to_string(),
                    predicate: spec.predicate.to_string(),
                    object_value,
                    confidence: spec.confidence,
                    asserted_date: sentence_date,
                });
            }
        }
    }

    Ok(claims)
}

/// Deterministic claim identity: UUIDv5 over document id + claim fields.
fn claim_id(
    document_id: &str,
    subject: &str,
    predicate: &str,
    object: &str,
    asserted_date: NaiveDate,
) -> Uuid {
    let key = format!(
        "{}|{}|{}|{}|{}",
        document_id, subject, predicate, object, asserted_date
    );
    Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes())
}

/// Strip over-captured sentence-start words, reject subjects that are
/// nothing but stopwords.
fn normalize_subject(raw: &str) -> Option<String> {
    let mut words: Vec<&str> = raw.split_whitespace().collect();
    while let Some(first) = words.first() {
        if SUBJECT_STOPWORDS.contains(first) {
            words.remove(0);
        } else {
            break;
        }
    }
    if words.is_empty() {
        return None;
    }
    Some(words.join(" "))
}

/// Parse an asserted date out of a sentence: `YYYY-MM-DD`, `YYYY-MM`, or
/// `Month YYYY`. First match wins; missing parts default to the first of
/// the month.
fn parse_asserted_date(sentence: &str) -> Option<NaiveDate> {
    let numeric = Regex::new(r"\b(\d{4})-(\d{1,2})(?:-(\d{1,2}))?\b").expect("static date pattern");
    if let Some(caps) = numeric.captures(sentence) {
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let day: u32 = caps.get(3).map_or(1, |m| m.as_str().parse().unwrap_or(1));
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    let named = Regex::new(
        r"\b(January|February|March|April|May|June|July|August|September|October|November|December)\s+(\d{4})\b",
    )
    .expect("static date pattern");
    if let Some(caps) = named.captures(sentence) {
        let month = match &caps[1] {
            "January" => 1,
            "February" => 2,
            "March" => 3,
            "April" => 4,
            "May" => 5,
            "June" => 6,
            "July" => 7,
            "August" => 8,
            "September" => 9,
            "October" => 10,
            "November" => 11,
            _ => 12,
        };
        let year: i32 = caps[2].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, 1);
    }

    None
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use signet_core::models::content_hash;

    fn test_document(text: &str) -> Document {
        Document {
            id: content_hash(text.as_bytes()),
            source: "arxiv".to_string(),
            urls: vec!["https://a.example/1".to_string()],
            retrieved_at: "2024-06-01T00:00:00Z".parse().unwrap(),
            raw_text: text.to_string(),
            language: "en".to_string(),
        }
    }

    fn test_config() -> ExtractionConfig {
        ExtractionConfig {
            min_confidence: 0.3,
        }
    }

    #[test]
    fn test_extract_deployed_claim_with_date() {
        let doc = test_document("TechniqueX deployed 2023-01 in coastal trials");

        let claims = extract(&doc, &test_config()).unwrap();
        let deployed: Vec<_> = claims.iter().filter(|c| c.predicate == "deployed").collect();

        assert_eq!(deployed.len(), 1);
        assert_eq!(deployed[0].subject_entity, "TechniqueX");
        assert_eq!(deployed[0].confidence, 0.9);
        assert_eq!(
            deployed[0].asserted_date,
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap()
        );
    }

    #[test]
    fn test_extract_named_month_date() {
        let doc = test_document("SwarmNet was demonstrated against live targets in June 2023");

        let claims = extract(&doc, &test_config()).unwrap();
        let demo = claims.iter().find(|c| c.predicate == "demonstrated").unwrap();

        assert_eq!(demo.subject_entity, "SwarmNet");
        assert_eq!(
            demo.asserted_date,
            NaiveDate::from_ymd_opt(2023, 6, 1).unwrap()
        );
    }

    #[test]
    fn test_extract_date_falls_back_to_retrieval() {
        let doc = test_document("GuidanceNet was tested at the northern range");

        let claims = extract(&doc, &test_config()).unwrap();
        let tested = claims.iter().find(|c| c.predicate == "tested").unwrap();

        assert_eq!(
            tested.asserted_date,
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
        );
    }

    #[test]
    fn test_extract_proposal_subject_after_verb() {
        let doc = test_document("We propose CoopGuide for multi-vehicle coordination");

        let claims = extract(&doc, &test_config()).unwrap();
        let published = claims.iter().find(|c| c.predicate == "published").unwrap();

        assert_eq!(published.subject_entity, "CoopGuide");
        assert_eq!(published.confidence, 0.4);
    }

    #[test]
    fn test_extract_organization_claim() {
        let doc =
            test_document("Northern Polytechnic University announced a cooperative interception testbed");

        let claims = extract(&doc, &test_config()).unwrap();
        let dev = claims.iter().find(|c| c.predicate == "developed").unwrap();

        assert_eq!(dev.subject_kind, "organization");
        assert!(dev.subject_entity.ends_with("University"));
        assert!(dev.object_value.contains("testbed"));
    }

    #[test]
    fn test_extract_strips_sentence_start_stopwords() {
        let doc = test_document("The ApproachNet technique converged quickly");

        let claims = extract(&doc, &test_config()).unwrap();
        let mention = claims.iter().find(|c| c.predicate == "referenced").unwrap();

        assert_eq!(mention.subject_entity, "ApproachNet");
    }

    #[test]
    fn test_extract_emits_below_confidence_floor() {
        let doc = test_document("The ApproachNet technique converged quickly");

        let claims = extract(&doc, &test_config()).unwrap();
        let mention = claims.iter().find(|c| c.predicate == "referenced").unwrap();

        // Below the 0.3 floor but still emitted
        assert!(mention.confidence < 0.3);
    }

    #[test]
    fn test_extract_is_deterministic() {
        let doc = test_document(
            "TechniqueX deployed 2023-01. We propose CoopGuide. The ApproachNet technique converged.",
        );

        let first = extract(&doc, &test_config()).unwrap();
        let second = extract(&doc, &test_config()).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_extract_empty_document_is_ingest_error() {
        let doc = test_document("   \n  ");

        let err = extract(&doc, &test_config()).unwrap_err();
        assert!(matches!(err, SignetError::Ingest(_)));
    }

    #[test]
    fn test_identical_assertions_dedup_within_document() {
        let doc = test_document("TechniqueX deployed 2023-01. TechniqueX deployed 2023-01.");

        let claims = extract(&doc, &test_config()).unwrap();
        let deployed: Vec<_> = claims.iter().filter(|c| c.predicate == "deployed").collect();

        assert_eq!(deployed.len(), 1);
    }

    #[test]
    fn test_parse_asserted_date_forms() {
        assert_eq!(
            parse_asserted_date("deployed 2023-04-17 offshore"),
            NaiveDate::from_ymd_opt(2023, 4, 17)
        );
        assert_eq!(
            parse_asserted_date("deployed 2023-04"),
            NaiveDate::from_ymd_opt(2023, 4, 1)
        );
        assert_eq!(
            parse_asserted_date("trials in October 2022"),
            NaiveDate::from_ymd_opt(2022, 10, 1)
        );
        assert_eq!(parse_asserted_date("no date here"), None);
    }
}

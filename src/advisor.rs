//! Scripted strategy advisor.
//!
//! Replies are picked from a fixed catalog by keyword overlap with the
//! question. There is no model behind it: the same question always gets
//! the same answer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Duration};

/// Confidence reported when nothing in the catalog matches.
pub const FALLBACK_CONFIDENCE: u8 = 65;

const FALLBACK_TEXT: &str = "That's a broad strategic question. Based on your current dashboard, \
the strongest levers are revenue growth, cost efficiency and risk exposure. \
Ask about one of them and I can walk through the numbers.";

/// A canned advisor answer with the keywords that trigger it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisorResponse {
    pub keywords: Vec<String>,
    pub text: String,
    /// 0-100
    pub confidence: u8,
    pub related_metrics: Vec<String>,
}

impl AdvisorResponse {
    pub fn new(keywords: &[&str], text: &str, confidence: u8, related_metrics: &[&str]) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
            text: text.to_string(),
            confidence: confidence.min(100),
            related_metrics: related_metrics.iter().map(|m| m.to_string()).collect(),
        }
    }

    /// Number of this response's keywords found in an already lower-cased input.
    pub fn match_count(&self, lowered: &str) -> usize {
        self.keywords.iter().filter(|k| lowered.contains(k.as_str())).count()
    }
}

/// Which selection pass produced a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    /// Two or more keywords matched.
    Strong,
    /// Exactly the single-keyword fallback pass.
    Weak,
    /// Nothing matched; generic answer.
    Fallback,
}

impl MatchTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchTier::Strong => "strong",
            MatchTier::Weak => "weak",
            MatchTier::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisorReply {
    pub text: String,
    pub confidence: u8,
    pub related_metrics: Vec<String>,
    pub matched_keywords: usize,
    pub tier: MatchTier,
    /// Index into the catalog, `None` for the fallback.
    pub catalog_index: Option<usize>,
}

impl AdvisorReply {
    fn fallback() -> Self {
        Self {
            text: FALLBACK_TEXT.to_string(),
            confidence: FALLBACK_CONFIDENCE,
            related_metrics: Vec::new(),
            matched_keywords: 0,
            tier: MatchTier::Fallback,
            catalog_index: None,
        }
    }

    fn from_entry(idx: usize, entry: &AdvisorResponse, matched: usize, tier: MatchTier) -> Self {
        Self {
            text: entry.text.clone(),
            confidence: entry.confidence,
            related_metrics: entry.related_metrics.clone(),
            matched_keywords: matched,
            tier,
            catalog_index: Some(idx),
        }
    }
}

/// Pick the catalog entry with the highest keyword overlap.
///
/// Entries need at least two matches on the first pass; if none qualify any
/// single match is accepted. Ties go to the earliest entry.
pub fn respond(input: &str, catalog: &[AdvisorResponse]) -> AdvisorReply {
    let lowered = input.to_lowercase();
    let counts: Vec<usize> = catalog.iter().map(|r| r.match_count(&lowered)).collect();

    for (min_matches, tier) in [(2, MatchTier::Strong), (1, MatchTier::Weak)] {
        let mut best: Option<(usize, usize)> = None;
        for (idx, &count) in counts.iter().enumerate() {
            if count < min_matches {
                continue;
            }
            if best.map_or(true, |(_, c)| count > c) {
                best = Some((idx, count));
            }
        }
        if let Some((idx, count)) = best {
            return AdvisorReply::from_entry(idx, &catalog[idx], count, tier);
        }
    }

    AdvisorReply::fallback()
}

/// Follow-up prompts offered under a reply.
pub fn suggestions(reply: &AdvisorReply, catalog: &[AdvisorResponse], limit: usize) -> Vec<String> {
    catalog
        .iter()
        .enumerate()
        .filter(|(idx, _)| Some(*idx) != reply.catalog_index)
        .filter_map(|(_, r)| r.keywords.first())
        .take(limit)
        .map(|k| format!("What should we do about {}?", k))
        .collect()
}

pub fn default_catalog() -> Vec<AdvisorResponse> {
    vec![
        AdvisorResponse::new(
            &["revenue", "growth", "sales", "income"],
            "Revenue is tracking 12% above last quarter, driven mostly by enterprise upsell. \
             Doubling down on the top two segments and tightening discount policy would add \
             an estimated 3-4 points of growth without new headcount.",
            87,
            &["Revenue", "ARR Growth", "Net Revenue Retention"],
        ),
        AdvisorResponse::new(
            &["risk", "threat", "exposure", "mitigation"],
            "Your highest-exposure cluster links supply-chain disruption with currency \
             volatility. Hedging the two largest supplier contracts and diversifying one \
             tier-1 vendor would cut modelled exposure by roughly a fifth.",
            82,
            &["Risk Index", "Supplier Concentration", "FX Exposure"],
        ),
        AdvisorResponse::new(
            &["market", "expansion", "international", "new region"],
            "Of the candidate regions, DACH scores best on market attractiveness versus \
             entry cost. A partner-led entry keeps fixed cost low while validating demand \
             over two quarters.",
            78,
            &["Market Share", "CAC", "Pipeline Coverage"],
        ),
        AdvisorResponse::new(
            &["cost", "efficiency", "budget", "spend"],
            "Operating cost per unit has drifted up 6% year over year. Automation of \
             order-to-cash and vendor consolidation are the two largest levers, together \
             worth about 4 points of margin.",
            84,
            &["Operating Margin", "Cost per Unit", "Automation Rate"],
        ),
        AdvisorResponse::new(
            &["competitor", "competition", "pricing", "share"],
            "Two competitors cut list prices this quarter, but win rates against them held \
             at 58%. Defend on value rather than price and target their mid-market accounts \
             with migration offers.",
            76,
            &["Win Rate", "Market Share", "Average Deal Size"],
        ),
        AdvisorResponse::new(
            &["talent", "hiring", "retention", "employee", "team"],
            "Attrition in engineering is 4 points above benchmark. Targeted retention for \
             senior staff and a faster hiring loop would protect the product roadmap more \
             cheaply than backfilling.",
            80,
            &["Employee Retention", "Time to Hire", "eNPS"],
        ),
        AdvisorResponse::new(
            &["digital", "transformation", "technology", "automation"],
            "Digital initiatives are 70% funded but only 45% delivered. Concentrating on \
             the three projects with measurable revenue impact would raise the delivery \
             rate and free budget for the rest.",
            79,
            &["Digital Adoption", "Project Delivery Rate", "IT Spend"],
        ),
        AdvisorResponse::new(
            &["supply", "chain", "inventory", "logistics"],
            "Inventory turns are down to 5.1 and lead times have stretched 9 days. A \
             dual-sourcing plan for critical components and a safety-stock review would \
             stabilise fulfilment.",
            81,
            &["Inventory Turns", "Lead Time", "Fill Rate"],
        ),
    ]
}

// =============================================================================
// Chat session
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Advisor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub speaker: Speaker,
    pub text: String,
    pub ts: u64,
    pub confidence: Option<u8>,
}

/// Per-session chat history. Discarded with the session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatTranscript {
    pub messages: Vec<ChatMessage>,
}

impl ChatTranscript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_exchange(&mut self, question: &str, reply: &AdvisorReply, ts: u64) {
        self.messages.push(ChatMessage {
            speaker: Speaker::User,
            text: question.to_string(),
            ts,
            confidence: None,
        });
        self.messages.push(ChatMessage {
            speaker: Speaker::Advisor,
            text: reply.text.clone(),
            ts,
            confidence: Some(reply.confidence),
        });
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

#[async_trait]
pub trait Advisor {
    async fn ask(&self, question: &str) -> AdvisorReply;
}

/// Catalog responder with a fixed artificial "thinking" delay.
#[derive(Debug, Clone)]
pub struct ScriptedAdvisor {
    catalog: Vec<AdvisorResponse>,
    delay: Duration,
}

impl ScriptedAdvisor {
    pub fn new(catalog: Vec<AdvisorResponse>, delay_ms: u64) -> Self {
        Self {
            catalog,
            delay: Duration::from_millis(delay_ms),
        }
    }

    pub fn with_default_catalog(delay_ms: u64) -> Self {
        Self::new(default_catalog(), delay_ms)
    }

    pub fn catalog(&self) -> &[AdvisorResponse] {
        &self.catalog
    }
}

#[async_trait]
impl Advisor for ScriptedAdvisor {
    async fn ask(&self, question: &str) -> AdvisorReply {
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        respond(question, &self.catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_catalog() -> Vec<AdvisorResponse> {
        vec![
            AdvisorResponse::new(&["alpha", "beta", "gamma"], "first", 90, &[]),
            AdvisorResponse::new(&["delta", "epsilon"], "second", 70, &["M"]),
        ]
    }

    #[test]
    fn test_two_keywords_select_response() {
        let reply = respond("Tell me about Delta and EPSILON", &tiny_catalog());
        assert_eq!(reply.text, "second");
        assert_eq!(reply.tier, MatchTier::Strong);
        assert_eq!(reply.matched_keywords, 2);
        assert_eq!(reply.related_metrics, vec!["M".to_string()]);
    }

    #[test]
    fn test_strong_match_beats_earlier_weak_match() {
        let reply = respond("alpha, delta and epsilon", &tiny_catalog());
        assert_eq!(reply.catalog_index, Some(1));
    }

    #[test]
    fn test_single_keyword_falls_back_to_weak_pass() {
        let reply = respond("only gamma here", &tiny_catalog());
        assert_eq!(reply.text, "first");
        assert_eq!(reply.tier, MatchTier::Weak);
    }

    #[test]
    fn test_tie_goes_to_earliest_entry() {
        let reply = respond("alpha delta", &tiny_catalog());
        assert_eq!(reply.catalog_index, Some(0));
    }

    #[test]
    fn test_no_match_returns_fallback() {
        let reply = respond("what is the weather", &tiny_catalog());
        assert_eq!(reply.tier, MatchTier::Fallback);
        assert_eq!(reply.confidence, FALLBACK_CONFIDENCE);
        assert!(reply.catalog_index.is_none());
    }

    #[test]
    fn test_empty_input_returns_fallback() {
        let reply = respond("", &default_catalog());
        assert_eq!(reply.confidence, 65);
    }

    #[test]
    fn test_default_catalog_revenue_question() {
        let reply = respond("How do we accelerate revenue growth?", &default_catalog());
        assert_eq!(reply.catalog_index, Some(0));
        assert_eq!(reply.tier, MatchTier::Strong);
    }

    #[test]
    fn test_suggestions_skip_current_entry() {
        let catalog = default_catalog();
        let reply = respond("revenue growth", &catalog);
        let tips = suggestions(&reply, &catalog, 3);
        assert_eq!(tips.len(), 3);
        assert!(tips.iter().all(|t| !t.contains("revenue")));
    }

    #[test]
    fn test_transcript_records_both_sides() {
        let mut t = ChatTranscript::new();
        let reply = respond("cost", &default_catalog());
        t.push_exchange("cost", &reply, 10);
        assert_eq!(t.len(), 2);
        assert_eq!(t.messages[0].speaker, Speaker::User);
        assert_eq!(t.messages[1].confidence, Some(reply.confidence));
        t.clear();
        assert!(t.is_empty());
    }

    #[tokio::test]
    async fn test_scripted_advisor_matches_pure_responder() {
        let advisor = ScriptedAdvisor::with_default_catalog(0);
        let q = "supply chain inventory";
        let reply = advisor.ask(q).await;
        assert_eq!(reply, respond(q, advisor.catalog()));
    }
}

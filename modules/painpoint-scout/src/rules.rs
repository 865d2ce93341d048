// Fixed rule tables for extraction, query expansion, fallback categorization
// and community lookup. Built once per process and shared by reference.

use regex::Regex;

use painpoint_common::TimeRange;

/// Case-insensitive substrings that mark a text unit as a complaint.
const COMPLAINT_KEYWORDS: &[&str] = &[
    // direct negatives
    "terrible",
    "awful",
    "horrible",
    "worst",
    "hate",
    "useless",
    "garbage",
    "sucks",
    "annoying",
    "frustrating",
    "frustrated",
    // problem vocabulary
    "problem",
    "issue",
    "bug",
    "broken",
    "crash",
    "error",
    "glitch",
    "doesn't work",
    "not working",
    "stopped working",
    // disappointment
    "disappointed",
    "disappointing",
    "regret",
    "waste of",
    "ripoff",
    "rip off",
    // improvement requests
    "wish it",
    "should have",
    "needs to",
    "please fix",
    "too expensive",
];

/// Negative-sentiment templates. Apostrophes may be straight or curly.
const COMPLAINT_PATTERNS: &[&str] = &[
    r"(?i)\bwhy (is|are|does|do|did)\b.{1,80}\b(so )?(bad|slow|expensive|buggy|broken|hard|difficult|complicated|unreliable)\b",
    r"(?i)\bcan['’]?t believe\b.{1,80}\b(still|doesn['’]?t|won['’]?t|isn['’]?t|can['’]?t)\b",
    r"(?i)\bwish\b.{1,80}\bwould\b",
    r"(?i)\b(sick|tired) of\b",
    r"(?i)\b(stopped|quit|stop) (using|buying|paying for)\b",
    r"(?i)\bdoes anyone else\b.{0,40}\b(have|get|hate|notice)\b",
    r"(?i)\bis it just me\b",
    r"(?i)\b(so|really|very|extremely|incredibly) (frustrat|disappoint|annoy)\w*",
];

const QUESTION_ASKERS: &str = r"(?i)\b(why|how)\b";
const QUESTION_NEGATIVES: &str =
    r"(?i)\b(bad|slow|broken|worse|expensive|buggy|laggy|crash\w*|fail\w*)\b";

/// Appended to the search term by the variation strategy.
const VARIATION_SUFFIXES: &[&str] = &[
    "problems",
    "issues",
    "broken",
    "hate",
    "worst",
    "frustrating",
    "not working",
    "complaints",
];

const TIME_SLICES: &[TimeRange] = &[
    TimeRange::Week,
    TimeRange::Month,
    TimeRange::Year,
    TimeRange::All,
];

/// One fallback category: a name, a description and the keywords that claim a candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRule {
    pub name: &'static str,
    pub description: &'static str,
    pub keywords: &'static [&'static str],
}

const FALLBACK_CATEGORIES: &[CategoryRule] = &[
    CategoryRule {
        name: "Performance Issues",
        description: "Slowness, lag, freezes and crashes",
        keywords: &["slow", "lag", "freeze", "crash", "performance", "speed"],
    },
    CategoryRule {
        name: "Pricing & Cost",
        description: "Complaints about price, fees and subscriptions",
        keywords: &["price", "expensive", "cost", "subscription", "fee", "money", "overpriced"],
    },
    CategoryRule {
        name: "Bugs & Errors",
        description: "Things that break, error out or behave incorrectly",
        keywords: &["bug", "error", "broken", "glitch", "doesn't work", "not working", "fails"],
    },
    CategoryRule {
        name: "Usability & Design",
        description: "Confusing interfaces and hard-to-use workflows",
        keywords: &["confusing", "interface", "design", "hard to use", "complicated", "unintuitive", "layout"],
    },
    CategoryRule {
        name: "Customer Support",
        description: "Unhelpful support, slow responses and refund trouble",
        keywords: &["support", "customer service", "refund", "no response", "ticket"],
    },
    CategoryRule {
        name: "Missing Features",
        description: "Requested functionality that does not exist yet",
        keywords: &["feature", "missing", "wish", "should have", "lacks", "option to"],
    },
    CategoryRule {
        name: "Privacy & Security",
        description: "Data handling, tracking and account security concerns",
        keywords: &["privacy", "security", "tracking", "hacked", "password", "personal data"],
    },
];

pub const CATCH_ALL_CATEGORY: CategoryRule = CategoryRule {
    name: "Other Issues",
    description: "Complaints that do not fit the other categories",
    keywords: &[],
};

/// Term keyword → communities worth searching when the AI suggestion fails.
const COMMUNITY_TABLE: &[(&[&str], &[&str])] = &[
    (&["iphone", "ios", "apple", "ipad", "macbook"], &["apple", "iphone", "ios"]),
    (&["android", "pixel", "samsung"], &["android", "AndroidQuestions"]),
    (&["windows", "microsoft"], &["windows", "Windows11", "techsupport"]),
    (&["linux", "ubuntu"], &["linux", "linuxquestions"]),
    (&["excel", "spreadsheet"], &["excel"]),
    (&["spotify"], &["spotify", "truespotify"]),
    (&["netflix", "streaming"], &["netflix", "cordcutters"]),
    (&["slack"], &["Slack", "sysadmin"]),
    (&["notion"], &["Notion", "productivity"]),
    (&["uber", "lyft", "rideshare"], &["uberdrivers", "lyftdrivers", "rideshare"]),
    (&["tesla", "car", "cars"], &["cars", "teslamotors", "MechanicAdvice"]),
    (&["game", "games", "gaming", "steam"], &["gaming", "pcgaming", "Steam"]),
    (&["bank", "banking", "credit"], &["personalfinance", "banking"]),
    (&["airline", "airlines", "flight", "flights"], &["flights", "travel"]),
    (&["laptop", "laptops", "pc"], &["laptops", "techsupport", "buildapc"]),
    (&["vpn"], &["VPN", "privacy"]),
    (&["wordpress"], &["Wordpress", "webdev"]),
    (&["shopify", "ecommerce"], &["shopify", "ecommerce"]),
    (&["zoom"], &["Zoom", "sysadmin"]),
    (&["jira", "asana", "trello"], &["jira", "projectmanagement"]),
];

pub struct Rulebook {
    complaint_keywords: &'static [&'static str],
    complaint_patterns: Vec<Regex>,
    question_askers: Regex,
    question_negatives: Regex,
    variation_suffixes: &'static [&'static str],
    time_slices: &'static [TimeRange],
    fallback_categories: &'static [CategoryRule],
    community_table: &'static [(&'static [&'static str], &'static [&'static str])],
}

impl Rulebook {
    pub fn standard() -> Self {
        Self {
            complaint_keywords: COMPLAINT_KEYWORDS,
            complaint_patterns: COMPLAINT_PATTERNS
                .iter()
                .map(|p| Regex::new(p).expect("valid complaint pattern"))
                .collect(),
            question_askers: Regex::new(QUESTION_ASKERS).expect("valid question pattern"),
            question_negatives: Regex::new(QUESTION_NEGATIVES).expect("valid question pattern"),
            variation_suffixes: VARIATION_SUFFIXES,
            time_slices: TIME_SLICES,
            fallback_categories: FALLBACK_CATEGORIES,
            community_table: COMMUNITY_TABLE,
        }
    }

    /// A text unit is a complaint if it hits a keyword, a sentiment template,
    /// or is a why/how question about something bad.
    pub fn is_complaint(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        if self.complaint_keywords.iter().any(|k| lower.contains(k)) {
            return true;
        }
        if self.complaint_patterns.iter().any(|re| re.is_match(text)) {
            return true;
        }
        text.contains('?') && self.question_askers.is_match(text) && self.question_negatives.is_match(text)
    }

    /// `term` followed by each complaint-oriented suffix.
    pub fn variations(&self, term: &str) -> Vec<String> {
        self.variation_suffixes
            .iter()
            .map(|suffix| format!("{term} {suffix}"))
            .collect()
    }

    pub fn time_slices(&self) -> &[TimeRange] {
        self.time_slices
    }

    /// First rule whose keywords appear in `content`; the catch-all otherwise.
    pub fn classify(&self, content: &str) -> &CategoryRule {
        let lower = content.to_lowercase();
        self.fallback_categories
            .iter()
            .find(|rule| rule.keywords.iter().any(|k| lower.contains(k)))
            .unwrap_or(&CATCH_ALL_CATEGORY)
    }

    /// Rule-sets in classification order, catch-all last.
    pub fn category_rules(&self) -> impl Iterator<Item = &CategoryRule> {
        self.fallback_categories
            .iter()
            .chain(std::iter::once(&CATCH_ALL_CATEGORY))
    }

    /// Communities from the fallback table whose keys match a word of `term`.
    pub fn communities_for(&self, term: &str) -> Vec<String> {
        let words: Vec<String> = term
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
            .collect();

        let mut communities: Vec<String> = Vec::new();
        for (keys, names) in self.community_table {
            if keys.iter().any(|k| words.iter().any(|w| w == k)) {
                for name in names.iter() {
                    if !communities.iter().any(|c| c.eq_ignore_ascii_case(name)) {
                        communities.push(name.to_string());
                    }
                }
            }
        }
        communities
    }
}

impl Default for Rulebook {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_hits_are_case_insensitive() {
        let rules = Rulebook::standard();
        assert!(rules.is_complaint("This product is TERRIBLE"));
        assert!(rules.is_complaint("Sync stopped working after the update"));
        assert!(!rules.is_complaint("Just bought one, looks nice"));
    }

    #[test]
    fn sentiment_templates_match() {
        let rules = Rulebook::standard();
        assert!(rules.is_complaint("Why is checkout so slow on mobile"));
        assert!(rules.is_complaint("I can't believe the app still lacks dark mode"));
        assert!(rules.is_complaint("I wish they would bring back the old layout"));
        assert!(rules.is_complaint("Sick of the constant popups"));
        assert!(rules.is_complaint("Is it just me or did battery life drop"));
    }

    #[test]
    fn why_question_about_bad_thing_matches() {
        let rules = Rulebook::standard();
        assert!(rules.is_complaint("How come the new version feels laggy?"));
        // Needs the question mark.
        assert!(!rules.is_complaint("How the new version feels laggy"));
        // Needs a negative token.
        assert!(!rules.is_complaint("How do I export my playlists?"));
    }

    #[test]
    fn variations_append_suffixes() {
        let rules = Rulebook::standard();
        let variations = rules.variations("spotify");
        assert_eq!(variations.len(), VARIATION_SUFFIXES.len());
        assert_eq!(variations[0], "spotify problems");
        assert!(variations.contains(&"spotify not working".to_string()));
    }

    #[test]
    fn classify_uses_first_matching_rule() {
        let rules = Rulebook::standard();
        assert_eq!(rules.classify("It is so slow to open").name, "Performance Issues");
        // "crash" belongs to performance even though "bug" also matches.
        assert_eq!(rules.classify("Crash bug on startup").name, "Performance Issues");
        assert_eq!(rules.classify("Way too expensive now").name, "Pricing & Cost");
        assert_eq!(rules.classify("The weather today is nice").name, "Other Issues");
    }

    #[test]
    fn category_rules_end_with_catch_all() {
        let rules = Rulebook::standard();
        let names: Vec<_> = rules.category_rules().map(|r| r.name).collect();
        assert_eq!(names.len(), 8);
        assert_eq!(names.last(), Some(&"Other Issues"));
    }

    #[test]
    fn community_table_matches_whole_words() {
        let rules = Rulebook::standard();
        assert_eq!(
            rules.communities_for("Spotify premium"),
            vec!["spotify".to_string(), "truespotify".to_string()]
        );
        // "carpet" must not match "car".
        assert!(rules.communities_for("carpet cleaner").is_empty());
    }

    #[test]
    fn community_table_dedupes_across_entries() {
        let rules = Rulebook::standard();
        let communities = rules.communities_for("slack zoom");
        let sysadmin = communities.iter().filter(|c| *c == "sysadmin").count();
        assert_eq!(sysadmin, 1);
    }
}

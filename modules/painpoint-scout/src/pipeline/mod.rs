pub mod categorizer;
pub mod engagement;
pub mod extractor;
pub mod relevance;
pub mod search;
pub mod stats;
pub mod summarizer;

use crate::error::Result;
use crate::models::question::Difficulty;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use url::Url;

pub const WIKIPEDIA_API_URL: &str = "https://en.wikipedia.org/w/api.php";
pub const STACKEXCHANGE_API_URL: &str = "https://api.stackexchange.com/2.3";

const WIKI_SUMMARY_LIMIT: usize = 500;
const SO_QUESTION_EXCERPT_LIMIT: usize = 300;
const SO_ANSWER_EXCERPT_LIMIT: usize = 400;
const CODING_KEYWORDS: [&str; 4] = ["code", "function", "algorithm", "programming"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WikiArticle {
    pub title: String,
    pub url: String,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WikipediaContent {
    pub topic: String,
    pub source: String,
    pub articles: Vec<WikiArticle>,
    pub total_found: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackOverflowAnswer {
    pub answer_id: i64,
    pub score: i64,
    pub is_accepted: bool,
    pub creation_date: Option<i64>,
    pub body_excerpt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackOverflowQuestion {
    pub question_id: i64,
    pub title: String,
    pub url: String,
    pub score: i64,
    pub view_count: i64,
    pub answer_count: i64,
    pub tags: Vec<String>,
    pub creation_date: Option<i64>,
    pub body_excerpt: String,
    pub accepted_answer: Option<StackOverflowAnswer>,
    pub top_answers: Vec<StackOverflowAnswer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackOverflowContent {
    pub query: String,
    pub tags: Vec<String>,
    pub source: String,
    pub questions: Vec<StackOverflowQuestion>,
    pub total_found: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningResources {
    pub topic: String,
    pub question_type: String,
    pub wikipedia_content: Option<WikipediaContent>,
    pub stackoverflow_content: Option<StackOverflowContent>,
    pub learning_path: Vec<String>,
    pub quick_tips: Vec<String>,
    pub additional_resources: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionHints {
    pub question: String,
    pub difficulty: Difficulty,
    pub topic: String,
    pub progressive_hints: Vec<String>,
    pub explanation: String,
    pub learning_resources: Option<LearningResources>,
    pub study_suggestions: Vec<String>,
}

/// Input for [`HintService::hints`].
#[derive(Debug, Clone, Default)]
pub struct HintQuery {
    pub question: String,
    pub correct_answer: String,
    pub user_answer: String,
    pub difficulty: Difficulty,
    pub topic: String,
}

#[derive(Deserialize)]
struct WikiSearchResponse {
    query: Option<WikiSearchQuery>,
}

#[derive(Deserialize)]
struct WikiSearchQuery {
    #[serde(default)]
    search: Vec<WikiSearchHit>,
}

#[derive(Deserialize)]
struct WikiSearchHit {
    title: String,
}

#[derive(Deserialize)]
struct WikiExtractResponse {
    query: Option<WikiExtractQuery>,
}

#[derive(Deserialize)]
struct WikiExtractQuery {
    #[serde(default)]
    pages: Vec<WikiPage>,
}

#[derive(Deserialize)]
struct WikiPage {
    title: String,
    #[serde(default)]
    extract: String,
    #[serde(default)]
    missing: bool,
}

#[derive(Deserialize)]
struct SeItems<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Deserialize)]
struct SeQuestion {
    question_id: i64,
    title: String,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    view_count: i64,
    #[serde(default)]
    answer_count: i64,
    #[serde(default)]
    tags: Vec<String>,
    creation_date: Option<i64>,
    #[serde(default)]
    body: String,
}

#[derive(Deserialize)]
struct SeAnswer {
    answer_id: i64,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    is_accepted: bool,
    creation_date: Option<i64>,
    #[serde(default)]
    body: String,
}

#[derive(Clone)]
pub struct HintService {
    client: Client,
    wikipedia_api: String,
    stackexchange_api: String,
}

impl HintService {
    pub fn new(client: Client) -> Self {
        Self::with_base_urls(client, WIKIPEDIA_API_URL, STACKEXCHANGE_API_URL)
    }

    pub fn with_base_urls(client: Client, wikipedia_api: impl Into<String>, stackexchange_api: impl Into<String>) -> Self {
        Self {
            client,
            wikipedia_api: wikipedia_api.into(),
            stackexchange_api: stackexchange_api.into(),
        }
    }

    pub async fn search_wikipedia(&self, topic: &str, max_results: usize) -> Result<WikipediaContent> {
        let limit = max_results.to_string();
        let search: WikiSearchResponse = self
            .client
            .get(&self.wikipedia_api)
            .query(&[
                ("action", "query"),
                ("list", "search"),
                ("format", "json"),
                ("formatversion", "2"),
                ("srsearch", topic),
                ("srlimit", limit.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let titles: Vec<String> = search
            .query
            .map(|q| q.search.into_iter().map(|hit| hit.title).collect())
            .unwrap_or_default();
        if titles.is_empty() {
            return Ok(WikipediaContent {
                topic: topic.to_string(),
                source: "Wikipedia".to_string(),
                articles: vec![],
                total_found: 0,
            });
        }

        let joined = titles.join("|");
        let extracts: WikiExtractResponse = self
            .client
            .get(&self.wikipedia_api)
            .query(&[
                ("action", "query"),
                ("prop", "extracts"),
                ("exintro", "1"),
                ("explaintext", "1"),
                ("format", "json"),
                ("formatversion", "2"),
                ("titles", joined.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let pages = extracts.query.map(|q| q.pages).unwrap_or_default();
        // Keep search ranking; the extracts endpoint returns pages in its own order.
        let articles: Vec<WikiArticle> = titles
            .iter()
            .filter_map(|title| pages.iter().find(|p| &p.title == title && !p.missing))
            .map(|page| WikiArticle {
                url: self.wikipedia_page_url(&page.title),
                title: page.title.clone(),
                summary: truncate_chars(page.extract.trim(), WIKI_SUMMARY_LIMIT),
            })
            .collect();

        Ok(WikipediaContent {
            topic: topic.to_string(),
            source: "Wikipedia".to_string(),
            total_found: articles.len(),
            articles,
        })
    }

    fn wikipedia_page_url(&self, title: &str) -> String {
        let slug = title.replace(' ', "_");
        Url::parse(&self.wikipedia_api)
            .ok()
            .and_then(|mut url| {
                url.set_query(None);
                url.path_segments_mut().ok()?.clear().push("wiki").push(&slug);
                Some(url.to_string())
            })
            .unwrap_or_else(|| format!("https://en.wikipedia.org/wiki/{}", slug))
    }

    pub async fn search_stackoverflow(
        &self,
        query: &str,
        tags: &[String],
        max_results: usize,
    ) -> Result<StackOverflowContent> {
        let pagesize = max_results.to_string();
        let tagged = tags.join(";");
        let mut params = vec![
            ("order", "desc"),
            ("sort", "relevance"),
            ("intitle", query),
            ("site", "stackoverflow"),
            ("pagesize", pagesize.as_str()),
            ("filter", "withbody"),
        ];
        if !tags.is_empty() {
            params.push(("tagged", tagged.as_str()));
        }

        let url = format!("{}/search/advanced", self.stackexchange_api);
        let found: SeItems<SeQuestion> = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut questions = Vec::with_capacity(found.items.len());
        for q in found.items {
            let answers = match self.fetch_answers(q.question_id, 3).await {
                Ok(answers) => answers,
                Err(e) => {
                    tracing::warn!(question_id = q.question_id, error = %e, "Failed to fetch StackOverflow answers");
                    vec![]
                }
            };
            questions.push(StackOverflowQuestion {
                url: format!("https://stackoverflow.com/questions/{}", q.question_id),
                question_id: q.question_id,
                title: strip_html(&q.title),
                score: q.score,
                view_count: q.view_count,
                answer_count: q.answer_count,
                tags: q.tags,
                creation_date: q.creation_date,
                body_excerpt: truncate_chars(&strip_html(&q.body), SO_QUESTION_EXCERPT_LIMIT),
                accepted_answer: answers.iter().find(|a| a.is_accepted).cloned(),
                top_answers: answers.into_iter().take(2).collect(),
            });
        }

        Ok(StackOverflowContent {
            query: query.to_string(),
            tags: tags.to_vec(),
            source: "StackOverflow".to_string(),
            total_found: questions.len(),
            questions,
        })
    }

    async fn fetch_answers(&self, question_id: i64, max_answers: usize) -> Result<Vec<StackOverflowAnswer>> {
        let url = format!("{}/questions/{}/answers", self.stackexchange_api, question_id);
        let pagesize = max_answers.to_string();
        let found: SeItems<SeAnswer> = self
            .client
            .get(&url)
            .query(&[
                ("order", "desc"),
                ("sort", "votes"),
                ("site", "stackoverflow"),
                ("pagesize", pagesize.as_str()),
                ("filter", "withbody"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(found
            .items
            .into_iter()
            .map(|a| StackOverflowAnswer {
                answer_id: a.answer_id,
                score: a.score,
                is_accepted: a.is_accepted,
                creation_date: a.creation_date,
                body_excerpt: truncate_chars(&strip_html(&a.body), SO_ANSWER_EXCERPT_LIMIT),
            })
            .collect())
    }

    /// Wikipedia for every topic, StackOverflow for coding questions or when
    /// tags are given. Lookup failures leave their section empty.
    pub async fn learning_resources(&self, topic: &str, question_type: &str, tags: &[String]) -> LearningResources {
        let mut resources = LearningResources {
            topic: topic.to_string(),
            question_type: question_type.to_string(),
            wikipedia_content: None,
            stackoverflow_content: None,
            learning_path: vec![],
            quick_tips: vec![],
            additional_resources: learning_suggestions(topic, question_type),
        };

        match self.search_wikipedia(topic, 2).await {
            Ok(wiki) if !wiki.articles.is_empty() => {
                resources.learning_path = wiki
                    .articles
                    .iter()
                    .map(|a| format!("Study: {}", a.title))
                    .collect();
                resources.wikipedia_content = Some(wiki);
            }
            Ok(_) => tracing::debug!(topic, "No Wikipedia articles found"),
            Err(e) => tracing::warn!(topic, error = %e, "Wikipedia lookup failed"),
        }

        if matches!(question_type, "coding" | "programming") || !tags.is_empty() {
            match self.search_stackoverflow(topic, tags, 3).await {
                Ok(so) if !so.questions.is_empty() => {
                    resources.quick_tips = so
                        .questions
                        .iter()
                        .take(2)
                        .filter_map(|q| q.accepted_answer.as_ref())
                        .map(|a| format!("Solution approach: {}", truncate_chars(&a.body_excerpt, 100)))
                        .collect();
                    resources.stackoverflow_content = Some(so);
                }
                Ok(_) => tracing::debug!(topic, "No StackOverflow questions found"),
                Err(e) => tracing::warn!(topic, error = %e, "StackOverflow lookup failed"),
            }
        }

        resources
    }

    pub async fn hints(&self, query: &HintQuery) -> QuestionHints {
        let mut hints = deterministic_hints(query);
        let lowered = query.question.to_lowercase();
        let question_type = if CODING_KEYWORDS.iter().any(|k| lowered.contains(k)) {
            "coding"
        } else {
            "general"
        };
        hints.learning_resources = Some(self.learning_resources(&query.topic, question_type, &[]).await);
        hints
    }
}

/// Everything in a hint response that needs no network.
pub fn deterministic_hints(query: &HintQuery) -> QuestionHints {
    let mut progressive_hints = progressive_hints(query.difficulty, &query.topic);
    progressive_hints.push(answer_hint(&query.correct_answer, &query.question));

    QuestionHints {
        question: query.question.clone(),
        difficulty: query.difficulty,
        topic: query.topic.clone(),
        progressive_hints,
        explanation: format!(
            "For this {} level question about '{}', the correct answer is '{}'. Focus on the underlying logic and how it connects to broader concepts in {}.",
            query.difficulty.as_str().to_lowercase(),
            truncate_chars(&query.question, 50),
            query.correct_answer,
            if query.topic.is_empty() { "the subject" } else { query.topic.as_str() },
        ),
        learning_resources: None,
        study_suggestions: study_suggestions(query),
    }
}

fn progressive_hints(difficulty: Difficulty, topic: &str) -> Vec<String> {
    match difficulty {
        Difficulty::Easy => vec![
            "Think about the basic concepts related to this topic".into(),
            "Consider the fundamental principles involved".into(),
            format!("The answer involves understanding {}", topic.to_lowercase()),
        ],
        Difficulty::Medium => vec![
            "Break down the problem into smaller parts".into(),
            "Consider how different concepts relate to each other".into(),
            "Think about practical applications of the theory".into(),
            "Review the key characteristics or properties involved".into(),
        ],
        Difficulty::Hard => vec![
            "This requires deep understanding of the underlying principles".into(),
            "Consider edge cases and advanced applications".into(),
            "Think about how this concept integrates with other advanced topics".into(),
            "Analyze the problem from multiple perspectives".into(),
        ],
    }
}

/// Describes the shape of the answer without revealing it.
pub fn answer_hint(correct_answer: &str, question: &str) -> String {
    let answer = correct_answer.trim();
    let words: Vec<&str> = answer.split_whitespace().collect();

    if answer.eq_ignore_ascii_case("true") || answer.eq_ignore_ascii_case("false") {
        "Consider whether the statement is always, sometimes, or never true".to_string()
    } else if matches!(answer, "A" | "B" | "C" | "D") {
        "Look for the option that best fits all parts of the question".to_string()
    } else if words.len() == 1 {
        let tail: Vec<&str> = question.split_whitespace().rev().take(3).collect::<Vec<_>>().into_iter().rev().collect();
        format!("The answer is a single term related to '{}'", tail.join(" "))
    } else {
        format!("The answer should be {} words long", words.len())
    }
}

fn study_suggestions(query: &HintQuery) -> Vec<String> {
    let difficulty = query.difficulty.as_str().to_lowercase();
    let mut suggestions = vec![
        format!("Review core concepts in {}", query.topic),
        format!("Practice more {} level questions on this topic", difficulty),
    ];

    let user_answer = query.user_answer.trim();
    if !user_answer.is_empty() && !user_answer.eq_ignore_ascii_case(query.correct_answer.trim()) {
        suggestions.push("Compare your reasoning with the correct explanation".to_string());
        suggestions.push("Identify where your understanding differs from the correct approach".to_string());
    }

    if query.difficulty == Difficulty::Hard {
        suggestions.push("Study advanced applications and edge cases".to_string());
        suggestions.push("Practice connecting this concept to other advanced topics".to_string());
    }
    suggestions
}

pub fn learning_suggestions(topic: &str, question_type: &str) -> Vec<String> {
    let mut suggestions = vec![
        format!("Practice problems related to {}", topic),
        format!("Watch video tutorials on {}", topic),
        format!("Read official documentation for {}", topic),
    ];
    match question_type {
        "coding" | "programming" => suggestions.extend([
            "Try coding exercises on platforms like LeetCode or HackerRank".to_string(),
            "Review code examples and best practices".to_string(),
            "Practice debugging similar problems".to_string(),
        ]),
        "theoretical" => suggestions.extend([
            "Create mind maps to visualize concepts".to_string(),
            "Discuss the topic with peers or mentors".to_string(),
            "Find real-world applications of the concept".to_string(),
        ]),
        _ => {}
    }
    suggestions
}

// Wide enough that html2text never wraps; whitespace is collapsed afterwards.
const HTML_TEXT_WIDTH: usize = 10_000;

fn html_tag() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| Regex::new(r"<[^>]*>").expect("static regex"))
}

fn whitespace() -> &'static Regex {
    static WS: OnceLock<Regex> = OnceLock::new();
    WS.get_or_init(|| Regex::new(r"\s+").expect("static regex"))
}

/// Plain text from a StackExchange HTML body.
pub fn strip_html(html: &str) -> String {
    let text = match html2text::config::plain_no_decorate().string_from_read(html.as_bytes(), HTML_TEXT_WIDTH) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(error = %e, "HTML to text conversion failed, dropping tags only");
            html_tag().replace_all(html, " ").into_owned()
        }
    };
    whitespace().replace_all(text.trim(), " ").into_owned()
}

/// Cuts `text` to `limit` chars, marking the cut with "...".
pub fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

//! Prompt builders for the summarization calls.
//!
//! The digest is produced for a Korean-reading audience, so prompts request
//! Korean output; JSON field names stay English to keep the response schema
//! stable across models. The tag vocabulary is injected rather than baked
//! into the text so new tags ship without touching this module.

use crate::storage::Article;

/// The per-article fields the prompts expose to the model.
fn article_line(index: usize, article: &Article) -> String {
    format!(
        "[기사 {}] id: \"{}\" / 제목: {} / 출처: {} / URL: {}",
        index + 1,
        article.id,
        article.title,
        article.source_id,
        article.url
    )
}

/// Tech batch prompt: per article a localized title, 2-sentence summary,
/// 1-sentence developer-angle insight, 1-2 tags from the vocabulary, and a
/// 0-100 relevance score, returned as a JSON array.
pub fn build_tech_prompt(articles: &[Article], tag_vocabulary: &[String]) -> String {
    let article_list = articles
        .iter()
        .enumerate()
        .map(|(i, a)| article_line(i, a))
        .collect::<Vec<_>>()
        .join("\n");

    let tags = tag_vocabulary.join(", ");

    format!(
        "아래 기술 기사 목록을 분석해주세요. 각 기사에 대해:\n\
         1. title: 한국어 제목 (원문 제목의 자연스러운 한국어 번역, 이미 한국어면 그대로)\n\
         2. summary: 한국어 요약 (2문장, 핵심 내용만)\n\
         3. insight: 왜 중요한지 인사이트 (1문장, 개발자 관점)\n\
         4. tags: 태그 배열 ({tags} 중 1~2개 택)\n\
         5. score: 개발자 관련성 점수 (0~100)\n\n\
         반드시 아래 형식의 JSON 배열만 반환하세요. 다른 텍스트 없이 JSON만:\n\
         [{{\"id\":\"원본id\",\"title\":\"...\",\"summary\":\"...\",\"insight\":\"...\",\"tags\":[\"ai\"],\"score\":85}}, ...]\n\n\
         {article_list}"
    )
}

/// World prompt: a 5-line aggregate situation summary plus per-article
/// localized title, one-line summary, and score, as a single JSON object.
pub fn build_world_prompt(articles: &[Article]) -> String {
    let headlines = articles
        .iter()
        .enumerate()
        .map(|(i, a)| format!("[{}] id: \"{}\" / {} ({})", i + 1, a.id, a.title, a.source_id))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "아래 세계 뉴스 헤드라인을 분석하고:\n\
         1. world_summary: 오늘의 세계정세 5줄 요약 (한국어, 각 줄은 핵심 이슈 1개씩, 개발자/사업가 관점에서 의미 포함)\n\
         2. articles: 각 기사별 한국어 제목과 한줄 요약\n\n\
         반드시 아래 형식의 JSON만 반환하세요:\n\
         {{\"world_summary\":\"줄1\\n줄2\\n줄3\\n줄4\\n줄5\",\"articles\":[{{\"id\":\"원본id\",\"title\":\"한국어 제목\",\"summary\":\"한줄요약\",\"score\":50}}, ...]}}\n\n\
         {headlines}"
    )
}

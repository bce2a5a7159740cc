//! Prompt builders for the model backends.
//!
//! Content is truncated before interpolation so a long article cannot blow
//! the request budget; truncation limits differ per task.

const RELEVANCE_CONTENT_LIMIT: usize = 2500;
const ENTITY_CONTENT_LIMIT: usize = 3000;
const MODERATION_CONTENT_LIMIT: usize = 2000;
const PII_CONTENT_LIMIT: usize = 4000;

fn truncate(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }
    // Back off to a char boundary.
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Prompt for the relevance backend.
pub fn relevance_prompt(title: &str, content: &str, matched_keywords: &[String]) -> String {
    let keyword_info = if matched_keywords.is_empty() {
        String::new()
    } else {
        format!("\nKeyword Matches Found: {matched_keywords:?}")
    };

    format!(
        r#"You are a cybersecurity analyst tasked with determining if news articles are relevant to cybersecurity topics.

Article Title: {title}
{keyword_info}

Article Content:
{content}

Please assess whether this article is relevant to cybersecurity topics including:
- Data breaches and security incidents
- Vulnerabilities and CVEs
- Malware and ransomware
- Threat actors and APT groups
- Security tools and technologies
- Cybersecurity policies and regulations
- Security research and analysis

Return your assessment in this exact JSON format:
{{
    "is_relevant": true/false,
    "relevancy_score": 0.85,
    "rationale": "Brief explanation of why this article is or isn't relevant to cybersecurity"
}}

Guidelines:
- relevancy_score should be between 0.0 and 1.0
- Score 0.8+ for highly relevant cybersecurity content
- Score 0.6-0.8 for moderately relevant content
- Score 0.4-0.6 for tangentially related content
- Score below 0.4 for irrelevant content
- Consider keyword matches as positive indicators
- Be conservative but not overly restrictive"#,
        title = title,
        keyword_info = keyword_info,
        content = truncate(content, RELEVANCE_CONTENT_LIMIT),
    )
}

/// Prompt for the entity-extraction backend.
pub fn entity_extraction_prompt(title: &str, content: &str) -> String {
    format!(
        r#"You are a cybersecurity analyst tasked with extracting structured entities from cybersecurity news articles.

Article Title: {title}

Article Content:
{content}

Please extract the following entities from this cybersecurity article and return them in JSON format:

1. CVEs: Common Vulnerabilities and Exposures (format: CVE-YYYY-NNNN)
2. Threat Actors: Named threat groups, APT groups, or cybercriminal organizations
3. Malware: Named malware families, ransomware, trojans, etc.
4. Vendors: Technology vendors, security companies mentioned
5. Products: Specific software products, platforms, or services mentioned
6. Sectors: Industry sectors affected (e.g., healthcare, finance, government)
7. Countries: Countries mentioned in relation to threats or incidents

Return ONLY a JSON object with this exact structure:
{{
    "cves": [],
    "threat_actors": [],
    "malware": [],
    "vendors": [],
    "products": [],
    "sectors": [],
    "countries": []
}}

Important guidelines:
- Only include entities that are explicitly mentioned in the content
- Use proper capitalization and official names when possible
- For CVEs, ensure they follow the CVE-YYYY-NNNN format
- Do not include generic terms or categories
- If no entities are found for a category, use an empty array
- Be conservative - only include entities you are confident about"#,
        title = title,
        content = truncate(content, ENTITY_CONTENT_LIMIT),
    )
}

/// Prompt for the moderation backend.
pub fn moderation_prompt(title: &str, content: &str) -> String {
    format!(
        r#"Analyze the following cybersecurity article for bias, sensationalism, or inappropriate content.

Title: {title}

Content: {content}

Check for:
1. Political or ideological bias
2. Sensational or exaggerated language
3. Emotional manipulation
4. Factual accuracy concerns
5. Professional tone appropriateness

Return your assessment in JSON format:
{{
    "has_bias": true/false,
    "bias_type": "political/emotional/sensational/none",
    "severity": "low/medium/high",
    "description": "Brief explanation",
    "confidence": 0.85
}}"#,
        title = title,
        content = truncate(content, MODERATION_CONTENT_LIMIT),
    )
}

/// Prompt for the PII span-detection backend.
pub fn pii_prompt(text: &str) -> String {
    format!(
        r#"Identify personally identifiable information in the text below. Report named persons, street addresses, dates of birth, and government identifiers.

Text:
{text}

Return ONLY a JSON array, one element per span, with this exact structure:
[
    {{"type": "PERSON", "begin_offset": 0, "end_offset": 8, "score": 0.95}}
]

Offsets are byte offsets into the text exactly as given. Use an empty array when nothing is found."#,
        text = truncate(text, PII_CONTENT_LIMIT),
    )
}

use crate::error::{Error, Result};
use crate::models::{AnalysisStrategy, PrInsights};

pub fn parse_insights(response: &str, strategy: AnalysisStrategy) -> Result<PrInsights> {
    let json_str = extract_json(response)?;

    let mut insights: PrInsights = serde_json::from_str(&json_str)
        .map_err(|e| Error::ParseError(format!("Failed to parse summary response: {}", e)))?;
    insights.strategy = strategy;
    Ok(insights)
}

fn extract_json(text: &str) -> Result<String> {
    if let Some(start) = text.find("```json") {
        let start = start + 7;
        if let Some(end) = text[start..].find("```") {
            return Ok(text[start..start + end].trim().to_string());
        }
    }

    if let Some(start) = text.find("```") {
        let start = start + 3;
        // Skip any language identifier on the same line
        let start = text[start..]
            .find('\n')
            .map(|i| start + i + 1)
            .unwrap_or(start);
        if let Some(end) = text[start..].find("```") {
            let content = text[start..start + end].trim();
            if content.starts_with('{') {
                return Ok(content.to_string());
            }
        }
    }

    // Raw object: scan for the matching closing brace, ignoring braces in strings.
    if let Some(start) = text.find('{') {
        let mut depth = 0;
        let mut in_string = false;
        let mut escape_next = false;

        for (offset, c) in text[start..].char_indices() {
            if escape_next {
                escape_next = false;
                continue;
            }

            match c {
                '\\' if in_string => escape_next = true,
                '"' => in_string = !in_string,
                '{' if !in_string => depth += 1,
                '}' if !in_string => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(text[start..start + offset + 1].to_string());
                    }
                }
                _ => {}
            }
        }
    }

    Err(Error::ParseError("No valid JSON found in response".to_string()))
}

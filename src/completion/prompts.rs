use crate::analyzer::SeoIssue;

pub fn seo_system() -> String {
    "You are an SEO expert. You give concise, actionable fixes. \
     Always respond with a single valid JSON object as specified and nothing else."
        .to_string()
}

/// Ask for replacement meta tags and fixes for a scanned page
pub fn optimize_page(website_url: &str, seo_score: i64, issues: &[SeoIssue]) -> String {
    let issue_lines = if issues.is_empty() {
        "none".to_string()
    } else {
        issues
            .iter()
            .map(|i| format!("- [{}] {}", i.code, i.message))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "The page {website_url} scored {seo_score}/100 in an SEO audit.\n\
         Issues found:\n{issue_lines}\n\n\
         Propose an SEO-optimized meta title (at most 60 chars), a meta description \
         (120-155 chars) and up to 5 concrete recommendations. List the issue codes \
         your proposal addresses.\n\
         Respond as JSON: {{\"meta_title\": \"...\", \"meta_description\": \"...\", \
         \"recommendations\": [\"...\"], \"addressed_issues\": [\"code\"]}}"
    )
}

pub fn rewrite_system() -> String {
    "You are an editor who rewrites web content for search engines and readers. \
     Keep the meaning, improve clarity and keyword use, and return HTML."
        .to_string()
}

pub fn rewrite_content(content: &str, tone: Option<&str>, keywords: &[String]) -> String {
    let mut prompt = String::from("Rewrite the following content.");
    if let Some(tone) = tone {
        prompt.push_str(&format!(" Use a {tone} tone."));
    }
    if !keywords.is_empty() {
        prompt.push_str(&format!(
            " Work these keywords in naturally: {}.",
            keywords.join(", ")
        ));
    }
    prompt.push_str(&format!(
        "\n\nContent:\n{content}\n\nRespond as JSON: {{\"html\": \"...\"}}"
    ));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Severity;

    #[test]
    fn test_optimize_prompt_lists_issues() {
        let issues = vec![SeoIssue {
            code: "meta_desc_missing".into(),
            severity: Severity::Error,
            message: "Missing meta description".into(),
            points_lost: 15,
        }];
        let prompt = optimize_page("https://a.com/", 70, &issues);
        assert!(prompt.contains("70/100"));
        assert!(prompt.contains("[meta_desc_missing]"));
    }

    #[test]
    fn test_rewrite_prompt_options() {
        let prompt = rewrite_content("<p>Hi</p>", Some("friendly"), &["seo".to_string()]);
        assert!(prompt.contains("friendly tone"));
        assert!(prompt.contains("seo"));
        assert!(!rewrite_content("x", None, &[]).contains("tone"));
    }
}

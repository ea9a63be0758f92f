//! Category templates and prompt assembly.

use briefing_types::{Category, Mood, Period, SourceDocument};

/// Per-category framing of the generation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryTemplate {
    /// Subject as it appears in titles, e.g. `AI` or `Health`.
    pub subject: &'static str,
    /// What the writer specializes in.
    pub focus: &'static str,
    pub audience: &'static str,
}

impl CategoryTemplate {
    /// `Weekly AI News Summary`, `Midweek Tech News Summary`, ...
    pub fn title(&self, period: Period) -> String {
        format!("{} {} News Summary", period_title(period), self.subject)
    }
}

const TEMPLATES: [(Category, CategoryTemplate); 11] = [
    (
        Category::Ai,
        CategoryTemplate {
            subject: "AI",
            focus: "artificial intelligence news",
            audience: "readers who follow AI research, products and policy",
        },
    ),
    (
        Category::Business,
        CategoryTemplate {
            subject: "Business",
            focus: "business and markets news",
            audience: "founders, managers and curious professionals",
        },
    ),
    (
        Category::Tech,
        CategoryTemplate {
            subject: "Tech",
            focus: "technology news",
            audience: "developers and technology enthusiasts",
        },
    ),
    (
        Category::Health,
        CategoryTemplate {
            subject: "Health",
            focus: "health and medicine news",
            audience: "health-conscious readers without a medical background",
        },
    ),
    (
        Category::Lifestyle,
        CategoryTemplate {
            subject: "Lifestyle",
            focus: "lifestyle and culture news",
            audience: "a general audience",
        },
    ),
    (
        Category::Finance,
        CategoryTemplate {
            subject: "Finance",
            focus: "personal finance and investing news",
            audience: "retail investors and savers",
        },
    ),
    (
        Category::Travel,
        CategoryTemplate {
            subject: "Travel",
            focus: "travel news",
            audience: "frequent and aspiring travellers",
        },
    ),
    (
        Category::Education,
        CategoryTemplate {
            subject: "Education",
            focus: "education and learning news",
            audience: "teachers, students and lifelong learners",
        },
    ),
    (
        Category::Entertainment,
        CategoryTemplate {
            subject: "Entertainment",
            focus: "entertainment news",
            audience: "fans of film, music, games and television",
        },
    ),
    (
        Category::Science,
        CategoryTemplate {
            subject: "Science",
            focus: "science news",
            audience: "curious readers who like discoveries explained plainly",
        },
    ),
    (
        Category::Sports,
        CategoryTemplate {
            subject: "Sports",
            focus: "sports news",
            audience: "sports fans",
        },
    ),
];

pub fn template_for(category: Category) -> &'static CategoryTemplate {
    TEMPLATES
        .iter()
        .find(|(c, _)| *c == category)
        .map(|(_, t)| t)
        .unwrap_or(&TEMPLATES[0].1)
}

fn period_title(period: Period) -> &'static str {
    match period {
        Period::Weekly => "Weekly",
        Period::Midweek => "Midweek",
    }
}

fn window_phrase(period: Period) -> &'static str {
    match period {
        Period::Weekly => "the past week",
        Period::Midweek => "the past few days",
    }
}

const DELIMITER_WIDTH: usize = 30;

/// One delimited block describing a document.
pub fn format_document(doc: &SourceDocument) -> String {
    format!(
        "Newsletter: {}\nEmail: {}\nSubject: {}\nDate: {}\n\nContent:\n{}\n\n{}",
        doc.sender_name,
        doc.sender_address,
        doc.subject,
        doc.received_at.to_rfc2822(),
        doc.body,
        "-".repeat(DELIMITER_WIDTH),
    )
}

/// The full prompt for one batch.
pub fn build_prompt(batch: &[SourceDocument], category: Category, period: Period, mood: Mood) -> String {
    let template = template_for(category);
    let title = template.title(period);
    let documents = batch
        .iter()
        .map(format_document)
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are a blog writer specializing in {focus}, writing for {audience}. \
Below is a collection of {subject} newsletters from {window}.

### Task:
1. Analyze each newsletter separately and ignore any that are purely advertisements or carry no real news.
2. Extract the key insights from the remaining newsletters and merge them into one structured, easy-to-read blog post.
3. Open with a short, engaging introduction to the news you will cover.
4. Close with an insightful takeaway.

### Tone:
{tone}

### Response Format:
Respond with a YAML document in a ```yaml block, using exactly these keys:
```yaml
subtitle: \"A short, engaging one-liner summarizing the post\"
description: \"A concise summary of the post (2-3 sentences)\"
tags: [\"{category}\", \"News\"]
content: |
  <h1>{title}</h1>

  <h2>[Subheading]</h2>
  <p>[Paragraph about the news]</p>

  <h2>[Another Subheading]</h2>
  <p>[More news]</p>

  <p>[Closing statement]</p>
```
The `content` block must be HTML using <h1>, <h2> and <p> elements, without bullet points unless necessary.

### Newsletters:
{documents}",
        focus = template.focus,
        audience = template.audience,
        subject = template.subject,
        window = window_phrase(period),
        tone = mood.profile().instruction,
        category = category.as_str(),
        title = title,
        documents = documents,
    )
}

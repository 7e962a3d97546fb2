//! Prompt construction for the map, reduce and per-entry summarization calls.
//!
//! The "Top Sources" block is a contract with `extractor`: the model is told to
//! emit a heading plus numbered `Title - Link - one-line summary` lines, and
//! the extractor parses exactly that shape. Changing the wording here requires
//! changing the parser with it.

/// System prompt shared by every summarization call.
pub fn system_prompt(subject_area: &str, audience_description: &str) -> String {
    format!(
        "You are an expert science and technology writer specializing in **{subject_area}**.\n\
         Your goal is to produce summaries that are **accurate, insightful, and engaging** \
         for {audience_description}.\n\
         - Avoid hype, speculation, or vague statements.\n\
         - Use accessible language while preserving scientific accuracy.\n\
         - When useful, briefly connect the item to broader trends or implications.\n\n\
         Your tone should balance **clarity, curiosity, and authority**."
    )
}

/// User prompt for the bulk (map and reduce) calls: thematic digest over a set
/// of rendered entry blocks, ending with the Top Sources list.
pub fn bulk_prompt(
    subject_area: &str,
    content_type: &str,
    blocks: &[String],
    top_k: usize,
    summary_length: usize,
) -> String {
    let joined = blocks.join("\n\n");
    format!(
        "You are an expert in **{subject_area}** and are acting as a science writer and analyst \
         summarizing the most recent {content_type} in **{subject_area}**.\n\n\
         Assume the reader has limited time and is going to rely on your summary to stay informed \
         about key developments and is going to make decisions based on your synthesis.\n\n\
         ---\n\n\
         ### Your Tasks\n\
         1. **Identify major themes or clusters** of related work or discussion.\n\
         2. For each theme:\n\
            - Give a short, descriptive heading\n\
            - Write a cohesive paragraph summarizing what's new, important, or changing.\n\
            - Give a brief overview of **2-4 key items** that illustrate the theme\n\
            - Highlight timing and potential impact where relevant.\n\
         3. **Conclude** with a synthesis paragraph describing the overall direction or mood in \
         this field right now.\n\n\
         ---\n\n\
         ### Top Sources\n\
         List the most impactful or interesting sources using the exact format below. \
         Include only {top_k} sources.\n\n\
         Format (strictly follow this structure, one per line):\n\
         `Title` - `Link` - `One-line summary`\n\n\
         Example:\n\n\
         Top Sources:\n\
         1. Example Breakthrough - https://example.com/item1 - One-sentence description.\n\
         2. Example Discovery - https://example.com/item2 - Another concise highlight.\n\n\
         ---\n\n\
         ### Output Constraints\n\
         - The total summary should not exceed **{summary_length} characters**.\n\
         - Write in full sentences and coherent paragraphs.\n\
         - Avoid markdown formatting except where specified above.\n\n\
         ---\n\n\
         ### {content_type}:\n\
         {joined}"
    )
}

/// User prompt for a single-entry detailed summary.
pub fn entry_prompt(
    subject_area: &str,
    content_type: &str,
    title: &str,
    summary: &str,
    link: &str,
    summary_length: usize,
) -> String {
    format!(
        "You are summarizing the following {content_type} in the field of **{subject_area}**.\n\n\
         ---\n\n\
         ### Instructions\n\
         Summarize this item in **one concise paragraph (~{summary_length} characters)** that:\n\
         1. Clearly states the **main topic or finding**.\n\
         2. Highlights **why it matters** - its impact, novelty, or context.\n\
         3. Mentions **timing** or relevance if appropriate.\n\
         4. Avoids redundancy, buzzwords, or overgeneralization.\n\
         5. Discuss any technical details only if they are crucial to understanding the \
         significance.\n\n\
         Keep the tone factual but engaging, suitable for an informed reader.\n\
         Do *not* use bullet points or markdown headings in the output.\n\n\
         ---\n\n\
         ### Source\n\
         **Title:** {title}\n\
         **Summary Text:** {summary}\n\
         **Link:** {link}"
    )
}

//! Fixed comment text posted by the bot.

/// Hidden marker embedded in the comment that moves an issue to stale. The
/// sweep looks for it later to learn when staleness began.
pub const MARK_STALE_MARKER: &str = "<!-- issuebot:mark-stale -->";

/// Hidden marker embedded in the comment that closes a stale issue.
pub const CLOSE_STALE_MARKER: &str = "<!-- issuebot:close-stale -->";

pub fn needs_triage() -> String {
    "I couldn't figure out how to label this issue, so I've labeled it for a \
     human to triage. Hang tight."
        .to_string()
}

pub fn follow_template(missing: &[String]) -> String {
    format!(
        "This issue does not seem to follow the issue template. Make sure you \
         provide all the required information.\n\nMissing sections: {}",
        quote_list(missing)
    )
}

pub fn missing_info(empty: &[String]) -> String {
    format!(
        "This issue is missing some required information. Please edit the \
         issue and fill in the sections below so we can help.\n\nSections left \
         unchanged from the template: {}",
        quote_list(empty)
    )
}

pub fn template_error() -> String {
    "I wasn't able to check this issue against the repository's issue \
     template. A maintainer will take a look."
        .to_string()
}

pub fn mark_stale(author: &str, needs_info_days: u32, stale_days: u32) -> String {
    format!(
        "Hey @{author}. We need more information to resolve this issue but \
         there hasn't been an update in {needs_info_days} days. I'm marking the \
         issue as stale and if there are no new updates in the next \
         {stale_days} days I will close it automatically.\n\nIf you have more \
         information that will help us get to the bottom of this, just add a \
         comment!\n{MARK_STALE_MARKER}"
    )
}

pub fn close_stale(author: &str) -> String {
    format!(
        "Since there haven't been any recent updates here, I am going to close \
         this issue.\n\n@{author} if you're still experiencing this problem and \
         want to continue the discussion just leave a comment here and we are \
         happy to re-open this.\n{CLOSE_STALE_MARKER}"
    )
}

pub fn label_email_subject(org: &str, repo: &str, number: u64, title: &str) -> String {
    format!("[{org}/{repo}] Issue #{number}: {title}")
}

pub fn label_email_header(label: &str) -> String {
    format!("New issue labeled '{label}'")
}

fn quote_list(items: &[String]) -> String {
    items
        .iter()
        .map(|s| format!("\"{s}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

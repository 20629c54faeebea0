//! HTML preview of a notice, styled loosely after a Threads post card.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_EVENT_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(https://earthquake\.usgs\.gov/earthquakes/eventpage/[^\s<"]+)"#)
        .expect("event url regex")
});

/// Escape the notice and turn its segments into line breaks and the USGS link into an anchor.
pub fn notice_to_html(notice: &str) -> String {
    let escaped = html_escape::encode_text(notice);
    // Headline gets a blank line after it, the disclaimer a single break.
    let with_breaks = escaped.replacen(" | ", "<br><br>", 1).replacen(" | ", "<br>", 1);
    RE_EVENT_URL
        .replace(
            &with_breaks,
            r#"<a href="$1" target="_blank" title="Visit the USGS detail page for this event">$1</a>"#,
        )
        .into_owned()
}

pub fn render_preview(notice: &str) -> String {
    format!(
        r#"<!doctype html>
<html lang="en" dir="ltr">
  <head>
    <meta charset="UTF-8" />
    <meta name="viewport" content="width=device-width,initial-scale=1,maximum-scale=2" />
    <title>Latest post</title>
    <style>
      body {{ padding: 1em 2em; font-family: -apple-system, "Segoe UI", Helvetica, Arial, sans-serif; }}
      .post {{ margin: auto; width: 50%; min-width: 18em; border-bottom: 1px solid #ddd; padding: 1em 0; }}
      .post-text {{ line-height: 1.4; white-space: normal; }}
      .post-actions {{ display: flex; gap: 1.5em; margin-top: 1em; color: #999; }}
    </style>
  </head>
  <body>
    <div class="post">
      <div class="post-text" dir="auto">{body}</div>
      <div class="post-actions" aria-hidden="true">
        <span title="Like">&#9825;</span>
        <span title="Comment">&#128172;</span>
        <span title="Repost">&#8634;</span>
        <span title="Share">&#10148;</span>
      </div>
    </div>
  </body>
</html>
"#,
        body = notice_to_html(notice)
    )
}

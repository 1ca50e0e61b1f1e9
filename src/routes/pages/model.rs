use std::time::Duration;

use serde::Deserialize;

use crate::session::TriggerDecision;

/// 授权服务器回调携带的参数，用户拒绝授权时只有 `error`
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

const LAYOUT_HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>Inbox Triage</title></head>
<body>
"#;

const LAYOUT_TAIL: &str = "</body>\n</html>\n";

fn layout(content: &str) -> String {
    format!("{LAYOUT_HEAD}{content}{LAYOUT_TAIL}")
}

pub fn landing_page(signed_in: bool) -> String {
    let action = if signed_in {
        r#"<p><a href="/emails">View prioritized emails</a> | <a href="/logout">Sign out</a></p>"#
    } else {
        r#"<p><a href="/login">Sign in with Google</a> to triage your unread mail.</p>"#
    };
    layout(&format!("<h1>Inbox Triage</h1>\n{action}\n"))
}

pub fn emails_page(decision: TriggerDecision, debounce_window: Duration) -> String {
    let status = match decision {
        TriggerDecision::Triggered => {
            "Sync started: new unread mail will appear shortly.".to_string()
        }
        _ => format!(
            "Recently synced: the next sync runs at most once every {} minutes.",
            (debounce_window.as_secs() / 60).max(1)
        ),
    };

    let sections: String = ["high", "medium", "low"]
        .iter()
        .map(|p| {
            format!(
                "<section data-priority=\"{p}\"><h2>{p}</h2><ul id=\"{p}-emails\"></ul></section>\n"
            )
        })
        .collect();

    layout(&format!(
        "<h1>Your inbox</h1>\n<p id=\"sync-status\">{status}</p>\n{sections}{SCRIPT}<p><a href=\"/logout\">Sign out</a></p>\n"
    ))
}

// 页面只负责骨架，列表由 /api/priorities/{priority} 填充
const SCRIPT: &str = r#"<script>
for (const p of ["high", "medium", "low"]) {
  fetch(`/api/priorities/${p}`).then(r => r.json()).then(res => {
    const list = document.getElementById(`${p}-emails`);
    for (const e of res.content || []) {
      const item = document.createElement("li");
      const link = document.createElement("a");
      link.href = e.link;
      link.textContent = `${e.subject} (${e.sent_from})`;
      item.appendChild(link);
      list.appendChild(item);
    }
  });
}
</script>
"#;

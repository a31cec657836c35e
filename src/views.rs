// HTML pages served by the web UI

use axum::response::Html;

use crate::models::youtube::Playlist;
use crate::playlists::{PlaylistTotals, SortKey, SortOrder};

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; margin: 2rem auto; max-width: 960px; color: #222; }
h1 { font-size: 1.6rem; }
table { border-collapse: collapse; width: 100%; }
th, td { padding: .4rem .6rem; border-bottom: 1px solid #ddd; text-align: left; vertical-align: middle; }
th a { color: inherit; }
img.thumb { width: 80px; border-radius: 4px; }
.error { background: #fde8e8; border: 1px solid #f5b5b5; padding: 1rem; border-radius: 6px; }
.toolbar { display: flex; gap: 1rem; align-items: center; margin: 1rem 0; }
button.danger { background: #c62828; color: #fff; border: 0; padding: .35rem .8rem; border-radius: 4px; cursor: pointer; }
ul.items { margin: .3rem 0 .6rem 1.5rem; }
"#;

const SCRIPT: &str = r#"
async function postJson(url, body) {
  const res = await fetch(url, {
    method: 'POST',
    headers: { 'Content-Type': 'application/json', 'X-Requested-With': 'XMLHttpRequest' },
    body: JSON.stringify(body),
  });
  return res.json();
}

function reportFailures(result) {
  if (result.failures && result.failures.length) {
    alert('Some deletions failed:\n' + result.failures.map(f => f.id + ': ' + f.error).join('\n'));
  } else if (result.error) {
    alert(result.error.message || result.error);
  }
}

async function deleteSelected() {
  const ids = [...document.querySelectorAll('input.pick:checked')].map(el => el.value);
  if (!ids.length || !confirm('Delete ' + ids.length + ' playlist(s)?')) return;
  const result = await postJson('/delete-bulk', { playlist_ids: ids });
  reportFailures(result);
  location.reload();
}

async function toggleItems(playlistId, button) {
  const target = document.getElementById('items-' + playlistId);
  if (target.dataset.loaded) { target.hidden = !target.hidden; return; }
  button.disabled = true;
  const res = await fetch('/playlist/' + encodeURIComponent(playlistId) + '/items');
  const data = await res.json();
  button.disabled = false;
  if (!res.ok) { reportFailures(data); return; }
  const list = document.createElement('ul');
  list.className = 'items';
  for (const item of data.items) {
    const li = document.createElement('li');
    const box = document.createElement('input');
    box.type = 'checkbox';
    box.value = item.playlistItemId;
    box.className = 'item-pick-' + playlistId;
    li.appendChild(box);
    li.appendChild(document.createTextNode(' ' + (item.title || item.videoId || '(untitled)')));
    list.appendChild(li);
  }
  const del = document.createElement('button');
  del.className = 'danger';
  del.textContent = 'Remove selected videos';
  del.onclick = async () => {
    const ids = [...document.querySelectorAll('input.item-pick-' + CSS.escape(playlistId) + ':checked')].map(el => el.value);
    if (!ids.length) return;
    const result = await postJson('/playlist/' + encodeURIComponent(playlistId) + '/items/delete-bulk', { playlist_item_ids: ids });
    reportFailures(result);
    location.reload();
  };
  target.appendChild(list);
  target.appendChild(del);
  target.dataset.loaded = '1';
  target.hidden = false;
}
"#;

/// Escape text for HTML element and attribute content
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{}</title>\n<style>{}</style>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        escape_html(title),
        STYLE,
        body
    ))
}

/// Landing page for signed-out visitors
pub fn landing_page() -> Html<String> {
    layout(
        "YouTube Playlists",
        "<h1>YouTube Playlists</h1>\n\
         <p>Sign in with your Google account to browse and clean up your playlists.</p>\n\
         <p><a href=\"/login\">Sign in with Google</a></p>",
    )
}

/// Failure page; offers a sign-in link when re-consent is the fix
pub fn error_page(message: &str, show_sign_in: bool) -> Html<String> {
    let action = if show_sign_in {
        "<a href=\"/login\">Sign in again</a>"
    } else {
        "<a href=\"/\">Back to playlists</a>"
    };
    layout(
        "Something went wrong",
        &format!(
            "<h1>Something went wrong</h1>\n<div class=\"error\">{}</div>\n<p>{}</p>",
            escape_html(message),
            action
        ),
    )
}

fn sort_link(label: &str, column: SortKey, current: SortKey, order: SortOrder) -> String {
    // Clicking the active column flips the order
    let next = if column == current { order.flipped() } else { SortOrder::Asc };
    let marker = match (column == current, order) {
        (true, SortOrder::Asc) => " ▲",
        (true, SortOrder::Desc) => " ▼",
        (false, _) => "",
    };
    format!(
        "<a href=\"/?sort={}&amp;order={}\">{}{}</a>",
        column.as_str(),
        next.as_str(),
        label,
        marker
    )
}

/// Playlist table for a signed-in user
pub fn playlists_page(
    playlists: &[Playlist],
    sort: SortKey,
    order: SortOrder,
    totals: PlaylistTotals,
) -> Html<String> {
    let mut rows = String::new();
    for playlist in playlists {
        let id = escape_html(&playlist.id);
        let thumb = playlist
            .thumbnail_url()
            .map(|url| format!("<img class=\"thumb\" src=\"{}\" alt=\"\">", escape_html(url)))
            .unwrap_or_default();
        rows.push_str(&format!(
            "<tr>\
             <td><input type=\"checkbox\" class=\"pick\" value=\"{id}\"></td>\
             <td>{thumb}</td>\
             <td><a href=\"https://www.youtube.com/playlist?list={id}\" target=\"_blank\" rel=\"noopener\">{title}</a>\
             <div id=\"items-{id}\" hidden></div></td>\
             <td>{count}</td>\
             <td><button type=\"button\" data-playlist-id=\"{id}\" onclick=\"toggleItems(this.dataset.playlistId, this)\">Videos</button> \
             <form method=\"post\" action=\"/delete/{id}?sort={sort}&amp;order={order}\" style=\"display:inline\" \
             onsubmit=\"return confirm('Delete this playlist?')\">\
             <button class=\"danger\" type=\"submit\">Delete</button></form></td>\
             </tr>\n",
            id = id,
            thumb = thumb,
            title = escape_html(playlist.title()),
            count = playlist.item_count(),
            sort = sort.as_str(),
            order = order.as_str(),
        ));
    }

    if playlists.is_empty() {
        rows.push_str("<tr><td colspan=\"5\">No playlists found.</td></tr>\n");
    }

    let body = format!(
        "<h1>Your playlists</h1>\n\
         <div class=\"toolbar\"><span>{playlists} playlists, {videos} videos</span>\
         <button class=\"danger\" type=\"button\" onclick=\"deleteSelected()\">Delete selected</button>\
         <a href=\"/logout\">Sign out</a></div>\n\
         <table>\n<thead><tr><th></th><th></th><th>{title_link}</th><th>{count_link}</th><th></th></tr></thead>\n\
         <tbody>\n{rows}</tbody>\n</table>\n<script>{script}</script>",
        playlists = totals.playlists,
        videos = totals.videos,
        title_link = sort_link("Title", SortKey::Title, sort, order),
        count_link = sort_link("Videos", SortKey::Count, sort, order),
        rows = rows,
        script = SCRIPT,
    );

    layout("Your playlists", &body)
}

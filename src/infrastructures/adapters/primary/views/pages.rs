use super::paths::{
    DASHBOARD_PATH, LOGIN_PATH, PROFILE_PATH, SIGN_IN_PATH, SIGN_OUT_PATH, dashboard_path,
    more_runs_path, runs_path,
};
use super::table::{Cell, HeaderView, SortDirection, TableView};
use crate::application::use_cases::list_repositories::RepositoryQuery;
use crate::application::use_cases::workflow_run_feed::{FeedPhase, RunFeed};
use crate::domain::models::repository::RepositoryRef;
use crate::domain::models::session::{Session, SessionUser};
use crate::domain::services::listing::SortState;
use crate::domain::services::status_badge::Tone;

pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn tone_class(tone: Tone) -> &'static str {
    match tone {
        Tone::Pending => "pending",
        Tone::Success => "success",
        Tone::Failure => "failure",
        Tone::Neutral => "neutral",
    }
}

fn render_cell(cell: &Cell) -> String {
    match cell {
        Cell::Text { value } => escape_html(value),
        Cell::Badge { badge } => format!(
            r#"<span class="badge badge-{}" data-icon="{}">{}</span>"#,
            tone_class(badge.tone),
            badge.icon,
            escape_html(badge.label)
        ),
        Cell::Link { href, label } => {
            format!(r#"<a href="{}">{}</a>"#, escape_html(href), escape_html(label))
        }
        Cell::Spinner => r#"<span class="spinner" role="status">Downloading…</span>"#.to_string(),
    }
}

fn render_header(header: &HeaderView, sort_href: Option<&dyn Fn(&HeaderView) -> String>) -> String {
    let indicator = match header.sort {
        Some(SortDirection::Asc) => " ▲",
        Some(SortDirection::Desc) => " ▼",
        None => "",
    };
    let label = escape_html(header.header);
    match sort_href {
        Some(href) if header.sortable => format!(
            r#"<th><a href="{}">{label}{indicator}</a></th>"#,
            escape_html(&href(header))
        ),
        _ => format!("<th>{label}{indicator}</th>"),
    }
}

fn render_table(table: &TableView, sort_href: Option<&dyn Fn(&HeaderView) -> String>) -> String {
    let mut html = String::from("<table>\n<thead><tr>");
    for header in &table.headers {
        html.push_str(&render_header(header, sort_href));
    }
    html.push_str("</tr></thead>\n<tbody>\n");
    if table.rows.is_empty() {
        html.push_str(&format!(
            "<tr><td colspan=\"{}\">No results.</td></tr>\n",
            table.headers.len().max(1)
        ));
    }
    for row in &table.rows {
        html.push_str("<tr>");
        for cell in row {
            html.push_str(&format!("<td>{}</td>", render_cell(cell)));
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</tbody>\n</table>\n");
    html
}

fn layout(title: &str, user: Option<&SessionUser>, body: &str) -> String {
    layout_with_head(title, user, "", body)
}

fn layout_with_head(title: &str, user: Option<&SessionUser>, head: &str, body: &str) -> String {
    let nav = match user {
        Some(user) => format!(
            r#"<nav><a href="{DASHBOARD_PATH}">Repositories</a> <a href="{PROFILE_PATH}">{}</a>
<form method="post" action="{SIGN_OUT_PATH}" class="inline"><button type="submit">Sign out</button></form></nav>"#,
            escape_html(user.display_name())
        ),
        None => String::new(),
    };
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{} · Actions Dashboard</title>
{head}</head>
<body>
{nav}
<main>
{body}
</main>
</body>
</html>
"#,
        escape_html(title)
    )
}

pub fn login_page() -> String {
    layout(
        "Sign in",
        None,
        &format!(
            r#"<h1>Actions Dashboard</h1>
<p>Sign in to browse your repositories and their workflow runs.</p>
<a class="button" href="{SIGN_IN_PATH}">Sign in with GitHub</a>"#
        ),
    )
}

pub fn access_denied_page(detail: Option<&str>) -> String {
    let detail = detail
        .map(|detail| format!("<p>{}</p>", escape_html(detail)))
        .unwrap_or_default();
    layout(
        "Access denied",
        None,
        &format!(
            r#"<h1>Access denied</h1>
{detail}<p><a href="{LOGIN_PATH}">Sign in again</a></p>"#
        ),
    )
}

pub fn error_page(title: &str, message: &str) -> String {
    layout(
        title,
        None,
        &format!(
            r#"<h1>{}</h1>
<p>{}</p>
<p><a href="{DASHBOARD_PATH}">Back to repositories</a></p>"#,
            escape_html(title),
            escape_html(message)
        ),
    )
}

pub fn dashboard_page(user: &SessionUser, query: &RepositoryQuery, table: &TableView) -> String {
    let sort_href = |header: &HeaderView| {
        let toggled = SortState::toggled(query.sort.as_ref(), header.id);
        dashboard_path(&query.search, 0, Some(&toggled))
    };

    let mut body = format!(
        r#"<h1>Repositories</h1>
<form method="get" action="{DASHBOARD_PATH}">
<input type="search" name="search" placeholder="Filter by name" value="{}">
{}<button type="submit">Filter</button>
<a href="{}">Refresh</a>
</form>
"#,
        escape_html(&query.search),
        query
            .sort
            .as_ref()
            .map(|sort| format!(
                r#"<input type="hidden" name="sort" value="{}"><input type="hidden" name="desc" value="{}">
"#,
                escape_html(&sort.column),
                sort.desc
            ))
            .unwrap_or_default(),
        escape_html(&format!("{DASHBOARD_PATH}?refresh=true")),
    );
    body.push_str(&render_table(table, Some(&sort_href)));

    if let Some(pagination) = table.pagination {
        body.push_str("<nav class=\"pagination\">");
        if pagination.has_previous {
            body.push_str(&format!(
                r#"<a href="{}">Previous</a> "#,
                escape_html(&dashboard_path(
                    &query.search,
                    pagination.page_index - 1,
                    query.sort.as_ref()
                ))
            ));
        }
        body.push_str(&format!(
            "Page {} of {}",
            pagination.page_index + 1,
            pagination.page_count.max(1)
        ));
        if pagination.has_next {
            body.push_str(&format!(
                r#" <a href="{}">Next</a>"#,
                escape_html(&dashboard_path(
                    &query.search,
                    pagination.page_index + 1,
                    query.sort.as_ref()
                ))
            ));
        }
        body.push_str("</nav>\n");
    }

    layout("Repositories", Some(user), &body)
}

const LOADING_REFRESH_SECS: u32 = 2;

// Submits the load-more form once the sentinel below the table is fully visible.
const INFINITE_SCROLL_SCRIPT: &str = r#"<script>
(() => {
  const sentinel = document.getElementById("load-more-sentinel");
  const form = document.getElementById("load-more");
  if (!sentinel || !form) return;
  const observer = new IntersectionObserver((entries) => {
    if (entries.some((entry) => entry.isIntersecting)) {
      observer.disconnect();
      form.requestSubmit();
    }
  }, { rootMargin: "20px", threshold: 1.0 });
  observer.observe(sentinel);
})();
</script>"#;

pub fn runs_page(
    user: &SessionUser,
    repository: &RepositoryRef,
    feed: &RunFeed,
    table: &TableView,
) -> String {
    let mut body = format!(
        "<h1>{}</h1>\n<h2>Workflow runs</h2>\n",
        escape_html(&repository.full_name())
    );
    body.push_str(&render_table(table, None));

    let mut head = String::new();
    if matches!(feed.phase, FeedPhase::FetchingPage(_)) {
        // Another request is loading this feed; poll until it lands.
        head.push_str(&format!(
            "<meta http-equiv=\"refresh\" content=\"{LOADING_REFRESH_SECS}\">\n"
        ));
        body.push_str(&format!(
            r#"<p class="loading">Loading workflows… <a href="{}">Reload</a></p>
"#,
            escape_html(&runs_path(repository))
        ));
    } else if feed.has_next_page {
        body.push_str(&format!(
            r#"<form id="load-more" method="post" action="{}"><button type="submit">Load more</button></form>
<div id="load-more-sentinel"></div>
{INFINITE_SCROLL_SCRIPT}
"#,
            escape_html(&more_runs_path(repository))
        ));
    } else if !feed.runs.is_empty() {
        body.push_str("<p class=\"end\">No more workflow runs.</p>\n");
    }

    layout_with_head(&repository.full_name(), Some(user), &head, &body)
}

pub fn profile_page(session: &Session) -> String {
    let user = &session.user;
    let body = format!(
        r#"<h1>Profile</h1>
<dl>
<dt>Name</dt><dd>{}</dd>
<dt>Login</dt><dd>{}</dd>
<dt>Session expires</dt><dd>{}</dd>
</dl>"#,
        escape_html(user.display_name()),
        escape_html(&user.login),
        session.expires_at.format("%Y-%m-%d %H:%M UTC")
    );
    layout("Profile", Some(user), &body)
}

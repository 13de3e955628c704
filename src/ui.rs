use crate::eligibility::CellState;
use crate::models::{DashboardResponse, MonthName};
use chrono::{Datelike, NaiveDate};

pub fn render_login(error: Option<&str>) -> String {
    page(
        "HabitPro",
        &format!(
            r#"<section class="card auth">
      <h1>HabitPro</h1>
      <p class="muted">Master your days.</p>
      <form method="post" action="/login">
        <label>Username <input type="text" name="username" autocomplete="username" /></label>
        <label>Password <input type="password" name="password" autocomplete="current-password" /></label>
        <label class="inline"><input type="checkbox" name="create" value="1" /> Create the profile if it does not exist</label>
        <button type="submit">Login / Create Account</button>
      </form>
      <p class="links"><a href="/api/backup">Download backup</a></p>
      {}
    </section>"#,
            error_block(error)
        ),
    )
}

pub fn render_onboarding(username: &str, today: NaiveDate, error: Option<&str>) -> String {
    let mut months = String::new();
    for month in MonthName::ALL {
        let selected = if month.index() == today.month0() { " selected" } else { "" };
        months.push_str(&format!(r#"<option value="{month}"{selected}>{month}</option>"#));
    }

    page(
        "Set up your month",
        &format!(
            r#"<section class="card auth">
      <h1>Welcome, {user}</h1>
      <p class="muted">Pick the month to track and list your habits, one per line.</p>
      <form method="post" action="/onboarding">
        <label>Year <input type="number" name="year" value="{year}" /></label>
        <label>Month <select name="month">{months}</select></label>
        <label>Habits <textarea name="habits" rows="5" placeholder="Read 10 pages"></textarea></label>
        <label>Top priorities <textarea name="top" rows="2" placeholder="Names from the list above"></textarea></label>
        <button type="submit">Finish</button>
      </form>
      <form method="post" action="/logout"><button class="ghost" type="submit">Back</button></form>
      {error}
    </section>"#,
            user = escape_html(username),
            year = today.year(),
            error = error_block(error),
        ),
    )
}

pub fn render_dashboard(view: &DashboardResponse, error: Option<&str>) -> String {
    let mut body = String::new();

    body.push_str(&format!(
        r#"<header class="card top">
      <div>
        <h1>{month}</h1>
        <p class="muted">Signed in as {user}</p>
      </div>
      <div class="headline">
        <span class="pct">{pct}%</span>
        <span class="muted">{label}</span>
      </div>
      <form method="post" action="/logout"><button class="ghost" type="submit">Logout</button></form>
    </header>
    {error}"#,
        month = escape_html(&view.month.label()),
        user = escape_html(&view.username),
        pct = view.headline_percent,
        label = escape_html(&view.headline_label),
        error = error_block(error),
    ));

    body.push_str(r#"<section class="card"><h2>Weeks</h2><ul class="weeks">"#);
    for week in &view.weeks {
        let class = if week.is_current { " class=\"current\"" } else { "" };
        body.push_str(&format!(
            "<li{class}><strong>{}</strong> <span class=\"muted\">days {}-{}</span> {}%</li>",
            escape_html(&week.bucket.label),
            week.bucket.start_day,
            week.bucket.end_day,
            week.bucket.percent
        ));
    }
    body.push_str("</ul></section>");

    if !view.top_habits.is_empty() {
        body.push_str(r#"<section class="card"><h2>Top priorities</h2><ul class="top-habits">"#);
        for habit in &view.top_habits {
            body.push_str(&format!(
                r#"<li>{} <progress max="100" value="{pct}"></progress> {pct}%</li>"#,
                escape_html(&habit.name),
                pct = habit.percent
            ));
        }
        body.push_str("</ul></section>");
    }

    body.push_str(r#"<section class="card grid-wrap"><table class="grid"><thead><tr><th>Habit</th>"#);
    for day in 1..=view.month.days() {
        let weekday = view
            .month
            .weekday(day)
            .map(|w| w.to_string())
            .unwrap_or_default();
        let class = if day == view.selected_day { " class=\"selected\"" } else { "" };
        body.push_str(&format!(
            r#"<th{class}><form method="post" action="/day"><input type="hidden" name="day" value="{day}" /><button class="day" type="submit">{day}<small>{weekday}</small></button></form></th>"#
        ));
    }
    body.push_str("<th>%</th></tr></thead><tbody>");

    for row in &view.habits {
        let star = if row.is_top { "&#9733; " } else { "" };
        body.push_str(&format!(
            r#"<tr><th class="name" title="{details}">{star}{name}</th>"#,
            details = escape_html(&row.details),
            name = escape_html(&row.name),
        ));
        let id = escape_html(row.id.as_str());
        for (idx, state) in row.cells.iter().enumerate() {
            let day = idx + 1;
            let cell = match state {
                CellState::Locked => r#"<span class="cell locked"></span>"#.to_string(),
                CellState::Done => format!(
                    r#"<form method="post" action="/cell/uncheck"><input type="hidden" name="habit_id" value="{id}" /><input type="hidden" name="day" value="{day}" /><button class="cell done" type="submit">&#10003;</button></form>"#
                ),
                CellState::Open => format!(
                    r#"<form method="post" action="/cell/check"><input type="hidden" name="habit_id" value="{id}" /><input type="hidden" name="day" value="{day}" /><button class="cell" type="submit"></button></form>"#
                ),
            };
            body.push_str(&format!("<td>{cell}</td>"));
        }
        body.push_str(&format!("<td class=\"pct-cell\">{}%</td></tr>", row.percent));
    }
    body.push_str("</tbody></table></section>");

    body.push_str(&format!(
        r#"<section class="card"><h2>Trend</h2>{chart}</section>
    <section class="card"><h2>Note for day {day}</h2>
      <form method="post" action="/note">
        <textarea name="text" rows="3">{note}</textarea>
        <button type="submit">Save note</button>
      </form>
    </section>"#,
        chart = trend_chart(&view.daily_series, view.selected_day),
        day = view.selected_day,
        note = escape_html(&view.note),
    ));

    page(&format!("{} | HabitPro", view.month.label()), &body)
}

/// Inline SVG line for the daily completion series.
fn trend_chart(series: &[u8], selected_day: u32) -> String {
    const WIDTH: f64 = 600.0;
    const HEIGHT: f64 = 160.0;
    const PAD: f64 = 20.0;

    if series.is_empty() {
        return r#"<p class="muted">No data yet</p>"#.to_string();
    }

    let step = if series.len() > 1 {
        (WIDTH - PAD * 2.0) / (series.len() - 1) as f64
    } else {
        0.0
    };
    let point = |idx: usize, pct: u8| {
        let x = PAD + idx as f64 * step;
        let y = HEIGHT - PAD - f64::from(pct) / 100.0 * (HEIGHT - PAD * 2.0);
        (x, y)
    };

    let mut svg = format!(r#"<svg class="chart" viewBox="0 0 {WIDTH} {HEIGHT}" role="img">"#);
    for ratio in [0.0, 0.5, 1.0] {
        let y = HEIGHT - PAD - ratio * (HEIGHT - PAD * 2.0);
        svg.push_str(&format!(
            r#"<line class="chart-grid" x1="{PAD}" y1="{y:.2}" x2="{:.2}" y2="{y:.2}" />"#,
            WIDTH - PAD
        ));
    }
    let path: Vec<String> = series
        .iter()
        .enumerate()
        .map(|(idx, pct)| {
            let (x, y) = point(idx, *pct);
            format!("{x:.2},{y:.2}")
        })
        .collect();
    svg.push_str(&format!(r#"<polyline class="chart-line" points="{}" />"#, path.join(" ")));
    for (idx, pct) in series.iter().enumerate() {
        let (x, y) = point(idx, *pct);
        let radius = if idx + 1 == selected_day as usize { 6 } else { 3 };
        svg.push_str(&format!(
            r#"<circle class="chart-point" cx="{x:.2}" cy="{y:.2}" r="{radius}"><title>Day {}: {pct}%</title></circle>"#,
            idx + 1
        ));
    }
    svg.push_str("</svg>");
    svg
}

fn error_block(error: Option<&str>) -> String {
    match error {
        Some(message) => format!(r#"<p class="error" role="alert">{}</p>"#, escape_html(message)),
        None => String::new(),
    }
}

pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn page(title: &str, body: &str) -> String {
    PAGE_HTML
        .replace("{{TITLE}}", &escape_html(title))
        .replace("{{BODY}}", body)
}

const PAGE_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>{{TITLE}}</title>
  <style>
    :root {
      --bg: #0f172a;
      --card: #1e293b;
      --ink: #e2e8f0;
      --muted: #94a3b8;
      --primary: #6366f1;
      --done: #22c55e;
      --line: #334155;
    }

    * {
      box-sizing: border-box;
    }

    body {
      margin: 0;
      min-height: 100vh;
      background: var(--bg);
      color: var(--ink);
      font-family: "Segoe UI", system-ui, sans-serif;
    }

    main {
      max-width: 1200px;
      margin: 0 auto;
      padding: 24px 16px 48px;
      display: grid;
      gap: 16px;
    }

    .card {
      background: var(--card);
      border-radius: 12px;
      padding: 16px 20px;
    }

    .auth {
      max-width: 420px;
      margin: 10vh auto 0;
      display: grid;
      gap: 12px;
    }

    .auth form {
      display: grid;
      gap: 10px;
    }

    label {
      display: grid;
      gap: 4px;
      font-size: 0.9rem;
    }

    label.inline {
      display: flex;
      align-items: center;
      gap: 8px;
    }

    input, select, textarea {
      background: var(--bg);
      color: var(--ink);
      border: 1px solid var(--line);
      border-radius: 6px;
      padding: 8px;
      font: inherit;
    }

    button {
      background: var(--primary);
      color: white;
      border: 0;
      border-radius: 6px;
      padding: 8px 14px;
      cursor: pointer;
      font: inherit;
    }

    button.ghost {
      background: transparent;
      border: 1px solid var(--line);
    }

    .muted {
      color: var(--muted);
    }

    .error {
      color: #f87171;
    }

    .top {
      display: flex;
      align-items: center;
      justify-content: space-between;
      gap: 16px;
    }

    .headline {
      display: grid;
      text-align: right;
    }

    .pct {
      font-size: 2.4rem;
      font-weight: 600;
      color: var(--primary);
    }

    .weeks, .top-habits {
      list-style: none;
      margin: 0;
      padding: 0;
      display: flex;
      flex-wrap: wrap;
      gap: 12px;
    }

    .weeks li {
      padding: 6px 10px;
      border-radius: 6px;
    }

    .weeks li.current {
      border: 1px solid var(--primary);
    }

    .grid-wrap {
      overflow-x: auto;
    }

    .grid {
      border-collapse: collapse;
    }

    .grid th, .grid td {
      padding: 2px;
      text-align: center;
    }

    .grid th.name {
      text-align: left;
      white-space: nowrap;
      padding-right: 10px;
    }

    .grid th.selected {
      background: rgba(99, 102, 241, 0.2);
      border-radius: 4px;
    }

    .grid form {
      margin: 0;
    }

    button.day {
      background: transparent;
      padding: 2px 4px;
      display: grid;
      line-height: 1.2;
    }

    button.day small {
      color: var(--muted);
      font-size: 0.65rem;
    }

    .cell {
      display: inline-block;
      width: 30px;
      height: 30px;
      padding: 0;
      border-radius: 6px;
      background: var(--bg);
      border: 1px solid var(--line);
    }

    .cell.done {
      background: var(--done);
      border-color: var(--done);
    }

    .cell.locked {
      opacity: 0.3;
    }

    .chart {
      width: 100%;
      height: 180px;
    }

    .chart-grid {
      stroke: var(--line);
      stroke-dasharray: 5 5;
    }

    .chart-line {
      fill: none;
      stroke: #3b82f6;
      stroke-width: 3;
    }

    .chart-point {
      fill: #60a5fa;
    }
  </style>
</head>
<body>
  <main>
    {{BODY}}
  </main>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserData;
    use crate::session::Session;
    use crate::stats::build_dashboard_at;

    #[test]
    fn escape_handles_markup() {
        assert_eq!(escape_html("<a href=\"x\">&'"), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }

    #[test]
    fn dashboard_renders_cells_by_state() {
        let mut data = UserData::onboard(
            2024,
            MonthName::February,
            &["<Read>".to_string()],
            &[],
        )
        .unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 2, 10).unwrap();
        let id = data.habits.as_slice()[0].id.clone();
        data.check(&id, 2, today).unwrap();
        let session = Session::new("ana", today);

        let html = render_dashboard(&build_dashboard_at(today, &session, &data), None);
        assert!(html.contains("February 2024"));
        assert!(html.contains("&lt;Read&gt;"));
        assert_eq!(html.matches("action=\"/cell/uncheck\"").count(), 1);
        assert_eq!(html.matches("action=\"/cell/check\"").count(), 9);
        assert_eq!(html.matches("cell locked").count(), 19);
    }

    #[test]
    fn login_page_shows_error() {
        let html = render_login(Some("Incorrect password."));
        assert!(html.contains("Incorrect password."));
        assert!(html.contains("action=\"/login\""));
    }

    #[test]
    fn chart_has_one_point_per_day() {
        let svg = trend_chart(&[0, 50, 100], 2);
        assert_eq!(svg.matches("<circle").count(), 3);
        assert!(svg.contains("r=\"6\""));
    }
}

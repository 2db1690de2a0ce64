use crate::model::AttendanceStatus;

use super::{Cell, Table};

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn render_cell(cell: &Cell) -> String {
    match cell {
        Cell::Text(text) => format!(
            r#"<td class="px-4 py-2 whitespace-nowrap">{}</td>"#,
            escape_html(text)
        ),
        Cell::Status(AttendanceStatus::Present) => {
            r#"<td class="px-4 py-2"><span class="rounded-full bg-emerald-100 text-emerald-700 px-2 py-0.5 text-xs font-semibold">Present</span></td>"#.to_string()
        }
        Cell::Status(AttendanceStatus::Absent) => {
            r#"<td class="px-4 py-2"><span class="rounded-full bg-rose-100 text-rose-700 px-2 py-0.5 text-xs font-semibold">Absent</span></td>"#.to_string()
        }
    }
}

pub fn render_html(table: &Table) -> Vec<u8> {
    let title = escape_html(&table.title);
    let head = table
        .headers
        .iter()
        .map(|h| {
            format!(
                r#"<th class="px-4 py-3 text-left text-xs font-bold uppercase tracking-wider">{}</th>"#,
                escape_html(h)
            )
        })
        .collect::<Vec<_>>()
        .join("");
    let body = if table.rows.is_empty() {
        format!(
            r#"<tr><td class="px-4 py-6 text-center text-slate-500" colspan="{}">No data found</td></tr>"#,
            table.headers.len().max(1)
        )
    } else {
        table
            .rows
            .iter()
            .map(|row| {
                format!(
                    r#"<tr class="border-t border-slate-100">{}</tr>"#,
                    row.iter().map(render_cell).collect::<Vec<_>>().join("")
                )
            })
            .collect::<Vec<_>>()
            .join("\n          ")
    };

    let html = format!(
        r####"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8"/>
  <meta content="width=device-width, initial-scale=1.0" name="viewport"/>
  <title>{title}</title>
  <script src="https://cdn.tailwindcss.com"></script>
</head>
<body class="bg-slate-50 text-slate-900 min-h-screen">
  <main class="max-w-[1200px] mx-auto w-full px-8 py-10">
    <h1 class="text-3xl font-extrabold mb-6">{title}</h1>
    <p class="text-sm text-slate-500 mb-4">{count} row(s)</p>
    <div class="overflow-x-auto rounded-xl border border-slate-200 bg-white shadow-sm">
      <table class="min-w-full text-sm">
        <thead class="bg-slate-100">
          <tr>{head}</tr>
        </thead>
        <tbody>
          {body}
        </tbody>
      </table>
    </div>
  </main>
</body>
</html>
"####,
        count = table.rows.len(),
    );
    html.into_bytes()
}

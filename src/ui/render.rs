//! 界面渲染
//!
//! 标题栏显示状态徽标；左侧为阶段列表（List 节流器），右侧按层级绘制影子子问题树，
//! 底部显示回调状态与快捷键提示。

use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::core::Phase;
use crate::reveal::DynamicSubQuestionRecord;
use crate::scheduler::BadgeView;

/// 一帧需要的全部数据
pub struct DemoView<'a> {
    pub badge: BadgeView,
    pub steps: &'a [Phase],
    pub levels: [&'a [DynamicSubQuestionRecord]; 2],
    pub streaming_allowed: bool,
    pub questions_complete: bool,
}

fn phase_color(phase: Phase) -> Color {
    match phase {
        Phase::Waiting => Color::DarkGray,
        Phase::SubQueries => Color::Cyan,
        Phase::ContextDocs => Color::Blue,
        Phase::Evaluate | Phase::Compare => Color::Magenta,
        Phase::Answer => Color::Yellow,
        Phase::Complete => Color::Green,
    }
}

/// 将内容按宽度换行，支持 UTF-8（按字符数，避免在 UTF-8 中间截断）
fn wrap_text(s: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![s.to_string()];
    }
    let mut lines = Vec::new();
    for para in s.split('\n') {
        let mut line = String::new();
        for ch in para.chars() {
            if line.chars().count() >= width {
                lines.push(std::mem::take(&mut line));
            }
            line.push(ch);
        }
        if !line.is_empty() {
            lines.push(line);
        }
    }
    lines
}

fn record_lines(record: &DynamicSubQuestionRecord, width: usize) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    let color = phase_color(record.phase);
    lines.push(Line::from(vec![
        Span::styled(
            format!("Q{}.{} ", record.level, record.level_question_num + 1),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!("[{}] ", record.phase.label()), Style::default().fg(color)),
        Span::raw(record.question.clone()),
    ]));
    for q in &record.sub_queries {
        lines.push(Line::from(Span::styled(
            format!("   ⌕ {}", q.query),
            Style::default().fg(Color::Cyan),
        )));
    }
    for doc in &record.context_docs {
        lines.push(Line::from(Span::styled(
            format!("   ▪ {}", doc.semantic_identifier),
            Style::default().fg(Color::Blue),
        )));
    }
    for line in wrap_text(&record.answer, width.saturating_sub(3).max(20)) {
        lines.push(Line::from(vec![Span::raw("   "), Span::raw(line)]));
    }
    lines
}

pub fn draw(f: &mut Frame, view: &DemoView) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(3)])
        .split(f.area());
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(18), Constraint::Min(20)])
        .split(rows[0]);

    let steps: Vec<Line> = view
        .steps
        .iter()
        .map(|p| {
            Line::from(Span::styled(
                format!("✓ {}", p.label()),
                Style::default().fg(phase_color(*p)),
            ))
        })
        .collect();
    let steps_block = Block::default().title(" Steps ").borders(Borders::ALL);
    f.render_widget(Paragraph::new(Text::from(steps)).block(steps_block), cols[0]);

    let title = if view.badge.visible {
        format!(" Pacer │ {} ", view.badge.label)
    } else {
        " Pacer ".to_string()
    };
    let width = cols[1].width.saturating_sub(2) as usize;
    let mut lines: Vec<Line> = Vec::new();
    for (level, records) in view.levels.iter().enumerate() {
        if records.is_empty() {
            continue;
        }
        if !lines.is_empty() {
            lines.push(Line::from(""));
        }
        lines.push(Line::from(Span::styled(
            format!("── level {} ──", level),
            Style::default().fg(Color::DarkGray),
        )));
        for record in records.iter() {
            lines.extend(record_lines(record, width));
        }
    }
    let tree_block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(phase_color(view.badge.phase)));
    f.render_widget(
        Paragraph::new(Text::from(lines))
            .block(tree_block)
            .wrap(Wrap { trim: false }),
        cols[1],
    );

    let flag = |on: bool, text: &'static str| {
        let color = if on { Color::Green } else { Color::DarkGray };
        Span::styled(text, Style::default().fg(color))
    };
    let status = Line::from(vec![
        flag(view.streaming_allowed, " answer streaming "),
        Span::raw("│"),
        flag(view.questions_complete, " questions revealed "),
    ]);
    let hint = " f 快进 │ r 重放 │ q/Esc 退出 ";
    let footer = Block::default()
        .title_bottom(Line::from(Span::styled(hint, Style::default().fg(Color::DarkGray))))
        .borders(Borders::ALL);
    f.render_widget(Paragraph::new(status).block(footer), rows[1]);
}

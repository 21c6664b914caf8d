use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Margin, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{
        Block, Borders, List, ListItem, Paragraph, Scrollbar, ScrollbarOrientation,
        ScrollbarState, Sparkline, Tabs, Wrap,
    },
};

use agenti_core::{ChatRole, Listing, SectorFilter, UserRole};

use crate::app::{
    format_price, sector_badge, App, DashboardTab, DetailTab, DraftField, InputMode, Plan,
    PurchaseStatus, Screen, WizardStep, QUICK_PROMPTS,
};

/// Mock creator revenue, one point per month
const REVENUE: [u64; 7] = [1200, 1900, 1600, 2400, 2800, 3500, 3100];
const REVENUE_MONTHS: [&str; 7] = ["Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul"];

/// Width of the label column on the wizard's details step
const FIELD_LABEL_WIDTH: u16 = 15;

/// Render **bold** spans and "- " / "* " bullets from a model reply
fn parse_markdown_line(text: &str) -> Line<'static> {
    let (bullet, body) = match text.strip_prefix("- ").or_else(|| text.strip_prefix("* ")) {
        Some(rest) => (true, rest),
        None => (false, text),
    };

    // An unmatched ** is shown literally
    if body.matches("**").count() % 2 == 1 {
        return Line::from(Span::raw(text.to_string()));
    }

    let mut spans: Vec<Span<'static>> = Vec::new();
    if bullet {
        spans.push(Span::styled("  • ", Style::default().fg(Color::Yellow)));
    }
    for (i, part) in body.split("**").enumerate() {
        if part.is_empty() {
            continue;
        }
        // Odd segments sit between a pair of ** markers
        if i % 2 == 1 {
            spans.push(Span::styled(part.to_string(), Style::default().add_modifier(Modifier::BOLD)));
        } else {
            spans.push(Span::raw(part.to_string()));
        }
    }

    Line::from(spans)
}

fn stars(rating: f32) -> String {
    let full = rating.round().clamp(0.0, 5.0) as usize;
    format!("{}{}", "★".repeat(full), "☆".repeat(5 - full))
}

fn dots(frame: u8) -> String {
    ".".repeat(frame as usize + 1)
}

/// Rect of the given size centered inside `area`
fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    app.list_area = None;
    app.chat_area = None;

    render_header(app, frame, header_area);

    match app.screen {
        Screen::Browse => render_browse_screen(app, frame, body_area),
        Screen::Detail => render_detail_screen(app, frame, body_area),
        Screen::Create => render_create_screen(app, frame, body_area),
        Screen::Dashboard => render_dashboard_screen(app, frame, body_area),
    }

    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let role_style = match app.session.role {
        UserRole::Buyer => Style::default().bg(Color::Blue).fg(Color::White).bold(),
        UserRole::Creator => Style::default().bg(Color::Magenta).fg(Color::White).bold(),
    };

    let mut spans = vec![
        Span::styled(" AGENT-i ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(format!(" {} ", app.session.role.as_str().to_uppercase()), role_style),
        Span::raw(" "),
    ];

    let owned = app.session.ledger.len();
    if owned > 0 {
        spans.push(Span::styled(
            format!("[{} owned] ", owned),
            Style::default().fg(Color::Green),
        ));
    }
    if !app.client.is_configured() {
        spans.push(Span::styled("[offline] ", Style::default().fg(Color::Red)));
    }
    spans.push(Span::styled(
        format!("v{}", env!("CARGO_PKG_VERSION")),
        Style::default().fg(Color::Gray),
    ));
    if let Some(message) = &app.status_message {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(message.clone(), Style::default().fg(Color::Yellow)));
    }

    let header = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mode_text = match app.screen {
        Screen::Browse => " MARKET ",
        Screen::Detail => " AGENT ",
        Screen::Create => " CREATE ",
        Screen::Dashboard => " DASHBOARD ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let pairs: Vec<(&str, &str)> = match (app.screen, app.input_mode) {
        (Screen::Browse, InputMode::Normal) => vec![
            ("j/k", "nav"),
            ("Enter", "open"),
            ("[/]", "sector"),
            ("/", "search"),
            ("C", "create"),
            ("D", "dashboard"),
            ("r", "role"),
            ("q", "quit"),
        ],
        (Screen::Browse, InputMode::Editing) => vec![("Enter", "done"), ("Esc", "stop typing")],
        (Screen::Detail, InputMode::Normal) => {
            let mut pairs = vec![("Tab", "tab"), ("p", "plan"), ("b", "buy")];
            if app.current_listing().is_some() {
                pairs.push(("i", "chat"));
            }
            if app.detail_tab == DetailTab::Demo {
                pairs.extend([("f", "quick prompt"), ("s", "seed prompt"), ("j/k", "scroll")]);
            }
            pairs.extend([("Esc", "back"), ("q", "quit")]);
            pairs
        }
        (Screen::Detail, InputMode::Editing) => {
            if app.chat_pending() {
                vec![("Esc", "stop typing")]
            } else {
                vec![("Enter", "send"), ("Esc", "stop typing")]
            }
        }
        (Screen::Create, InputMode::Normal) => match app.wizard_step {
            WizardStep::Idea => vec![
                ("i", "describe"),
                ("g", "generate"),
                ("m", "manual"),
                ("Esc", "back"),
            ],
            WizardStep::Details => {
                let mut pairs = vec![("j/k", "field"), ("i", "edit")];
                if app.selected_draft_field() == DraftField::Sector {
                    pairs.push(("h/l", "sector"));
                }
                pairs.extend([("+", "capability"), ("n", "review"), ("Esc", "back")]);
                pairs
            }
            WizardStep::Review => vec![("Enter", "publish"), ("Esc", "edit")],
        },
        (Screen::Create, InputMode::Editing) => match app.wizard_step {
            WizardStep::Idea => vec![("Enter", "generate"), ("Esc", "stop typing")],
            _ => vec![("Enter", "next field"), ("Esc", "stop typing")],
        },
        (Screen::Dashboard, _) => vec![
            ("Tab", "tab"),
            ("j/k", "nav"),
            ("Enter", "open"),
            ("r", "role"),
            ("Esc", "market"),
            ("q", "quit"),
        ],
    };

    let mut spans = vec![
        Span::styled(mode_text, mode_style),
        Span::styled(" ", label_style),
    ];
    for (key, label) in pairs {
        spans.push(Span::styled(format!(" {} ", key), key_style));
        spans.push(Span::styled(format!(" {} ", label), label_style));
    }

    let footer = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

// Browse

fn render_browse_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [input_area, filter_area, results_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(1),
        Constraint::Min(0),
    ])
    .areas(area);

    let editing = app.input_mode == InputMode::Editing;
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if editing { Color::Yellow } else { Color::DarkGray }))
        .title(" Search agents ");

    let input = if app.search_input.is_empty() && !editing {
        Paragraph::new("Press / to search by name or description")
            .style(Style::default().fg(Color::DarkGray))
    } else {
        Paragraph::new(app.search_input.as_str()).style(Style::default().fg(Color::Cyan))
    };
    frame.render_widget(input.block(input_block), input_area);

    if editing {
        frame.set_cursor_position((
            input_area.x + app.search_input.chars().count() as u16 + 1,
            input_area.y + 1,
        ));
    }

    // Sector filter bar
    let selected = app.sector_filter();
    let mut filter_spans = vec![Span::raw(" ")];
    for filter in SectorFilter::all() {
        let style = if filter == selected {
            Style::default().bg(Color::Cyan).fg(Color::Black).bold()
        } else {
            Style::default().fg(Color::Gray)
        };
        filter_spans.push(Span::styled(format!(" {} ", filter.label()), style));
        filter_spans.push(Span::raw(" "));
    }
    frame.render_widget(Paragraph::new(Line::from(filter_spans)), filter_area);

    let [list_area, preview_area] = Layout::horizontal([
        Constraint::Percentage(45),
        Constraint::Percentage(55),
    ])
    .areas(results_area);
    app.list_area = Some(list_area);

    let items: Vec<ListItem> = app
        .visible_listings()
        .into_iter()
        .map(|listing| {
            let mut spans = vec![
                Span::styled(
                    format!("[{}] ", sector_badge(listing.sector)),
                    Style::default().fg(Color::Magenta),
                ),
                Span::styled(listing.name.clone(), Style::default().bold()),
                Span::styled(format!("  ★{:.1}", listing.rating), Style::default().fg(Color::Yellow)),
                Span::styled(
                    format!("  ${}/mo", format_price(listing.pricing.monthly)),
                    Style::default().fg(Color::Green),
                ),
            ];
            if app.session.is_owned(&listing.id) {
                spans.push(Span::styled("  ✓ owned", Style::default().fg(Color::Cyan)));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();

    let results_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(format!(" Agents ({}) ", items.len()));

    if items.is_empty() {
        let empty = Paragraph::new("No agents match this search.")
            .style(Style::default().fg(Color::DarkGray))
            .block(results_block);
        frame.render_widget(empty, list_area);
    } else {
        let list = List::new(items)
            .block(results_block)
            .highlight_style(
                Style::default()
                    .bg(Color::Blue)
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("> ");
        frame.render_stateful_widget(list, list_area, &mut app.browse_state);
    }

    let preview_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Preview ");

    let preview = match app.selected_browse_id().and_then(|id| app.catalog.get(&id).ok()) {
        Some(listing) => listing_card(listing),
        None => Text::from(Span::styled(
            "Select an agent to preview",
            Style::default().fg(Color::DarkGray),
        )),
    };
    frame.render_widget(
        Paragraph::new(preview).block(preview_block).wrap(Wrap { trim: true }),
        preview_area,
    );
}

fn listing_card(listing: &Listing) -> Text<'static> {
    let mut lines = vec![
        Line::from(Span::styled(listing.name.clone(), Style::default().fg(Color::Yellow).bold())),
        Line::from(Span::styled(
            listing.tagline.clone(),
            Style::default().add_modifier(Modifier::ITALIC),
        )),
        Line::from(vec![
            Span::styled(format!("{}  ", listing.sector), Style::default().fg(Color::Magenta)),
            Span::styled(format!("by {}", listing.creator), Style::default().fg(Color::Gray)),
        ]),
        Line::from(vec![
            Span::styled(stars(listing.rating), Style::default().fg(Color::Yellow)),
            Span::raw(format!(" {:.1} ({} reviews)", listing.rating, listing.reviews_count)),
        ]),
        Line::default(),
        Line::from(listing.description.clone()),
        Line::default(),
    ];
    for capability in &listing.capabilities {
        lines.push(Line::from(vec![
            Span::styled("  ✓ ", Style::default().fg(Color::Green)),
            Span::raw(capability.clone()),
        ]));
    }
    Text::from(lines)
}

// Detail

fn render_detail_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let Some(listing) = app.current_listing().cloned() else {
        render_not_found(frame, area);
        return;
    };

    let [title_area, body_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(0),
    ])
    .areas(area);

    let title = Paragraph::new(vec![
        Line::from(vec![
            Span::styled(format!(" {} ", listing.name), Style::default().fg(Color::Yellow).bold()),
            Span::styled(
                format!(" {} ", listing.sector),
                Style::default().bg(Color::Magenta).fg(Color::White),
            ),
        ]),
        Line::from(Span::styled(
            format!(" {}", listing.tagline),
            Style::default().add_modifier(Modifier::ITALIC),
        )),
        Line::from(Span::styled(
            format!(" by {}", listing.creator),
            Style::default().fg(Color::Gray),
        )),
    ]);
    frame.render_widget(title, title_area);

    let [main_area, checkout_area] = Layout::horizontal([
        Constraint::Min(40),
        Constraint::Length(32),
    ])
    .areas(body_area);

    let [tabs_area, tab_body_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
    ])
    .areas(main_area);

    let selected_tab = DetailTab::all()
        .iter()
        .position(|tab| *tab == app.detail_tab)
        .unwrap_or(0);
    let tabs = Tabs::new(
        DetailTab::all()
            .iter()
            .enumerate()
            .map(|(i, tab)| format!("{} {}", i + 1, tab.title())),
    )
    .select(selected_tab)
    .style(Style::default().fg(Color::Gray))
    .highlight_style(Style::default().fg(Color::Cyan).bold().underlined());
    frame.render_widget(tabs, tabs_area);

    match app.detail_tab {
        DetailTab::Overview => render_overview_tab(&listing, frame, tab_body_area),
        DetailTab::Demo => render_demo_tab(app, &listing, frame, tab_body_area),
        DetailTab::Reviews => render_reviews_tab(&listing, frame, tab_body_area),
    }

    render_checkout(app, &listing, frame, checkout_area);
}

fn render_not_found(frame: &mut Frame, area: Rect) {
    let text = Text::from(vec![
        Line::from(Span::styled("Listing not found.", Style::default().fg(Color::Red).bold())),
        Line::default(),
        Line::from(Span::styled(
            "Press Esc to return to the marketplace.",
            Style::default().fg(Color::DarkGray),
        )),
    ]);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    let paragraph = Paragraph::new(text).alignment(Alignment::Center).block(block);
    frame.render_widget(paragraph, centered(area, 50, 5));
}

fn render_overview_tab(listing: &Listing, frame: &mut Frame, area: Rect) {
    let mut lines = vec![
        Line::from(Span::styled("About", Style::default().fg(Color::Cyan).bold())),
        Line::from(listing.description.clone()),
        Line::default(),
        Line::from(Span::styled("Capabilities", Style::default().fg(Color::Cyan).bold())),
    ];
    for capability in &listing.capabilities {
        lines.push(Line::from(vec![
            Span::styled("  ✓ ", Style::default().fg(Color::Green)),
            Span::raw(capability.clone()),
        ]));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
        area,
    );
}

fn render_demo_tab(app: &mut App, listing: &Listing, frame: &mut Frame, area: Rect) {
    let [chat_area, prompts_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(1),
        Constraint::Length(3),
    ])
    .areas(area);

    app.chat_area = Some(chat_area);
    app.chat_height = chat_area.height.saturating_sub(2);
    app.chat_width = chat_area.width.saturating_sub(2);

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(format!(" Test drive {} ({}) ", listing.name, app.client.model()));

    let pending = app.chat_pending();
    let mut lines: Vec<Line> = Vec::new();
    if app.conversation.is_empty() && !pending {
        lines.push(Line::from(Span::styled(
            format!("Say hello to {}. Responses are generated live.", listing.name),
            Style::default().fg(Color::DarkGray),
        )));
    }

    for msg in app.conversation.messages() {
        match msg.role {
            ChatRole::User => {
                lines.push(Line::from(Span::styled(
                    "You:",
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                )));
                lines.push(Line::from(msg.content.clone()));
            }
            ChatRole::Assistant => {
                lines.push(Line::from(Span::styled(
                    format!("{}:", listing.name),
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                )));
                for line in msg.content.lines() {
                    lines.push(parse_markdown_line(line));
                }
            }
        }
        lines.push(Line::default());
    }

    if pending {
        lines.push(Line::from(Span::styled(
            format!("{}:", listing.name),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(Span::styled(
            format!("Processing request{}", dots(app.animation_frame)),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    let total_lines = lines.len();
    let chat = Paragraph::new(lines)
        .block(chat_block)
        .wrap(Wrap { trim: true })
        .scroll((app.chat_scroll, 0));
    frame.render_widget(chat, chat_area);

    if total_lines as u16 > app.chat_height {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("^"))
            .end_symbol(Some("v"));
        let mut scrollbar_state =
            ScrollbarState::new(total_lines).position(app.chat_scroll as usize);
        frame.render_stateful_widget(
            scrollbar,
            chat_area.inner(Margin {
                vertical: 1,
                horizontal: 0,
            }),
            &mut scrollbar_state,
        );
    }

    // Quick prompts, plus the listing's own opener when it has one
    let mut prompt_spans = vec![Span::styled(" Try: ", Style::default().fg(Color::DarkGray))];
    for prompt in QUICK_PROMPTS {
        prompt_spans.push(Span::styled(
            format!(" {} ", prompt),
            Style::default().bg(Color::DarkGray).fg(Color::White),
        ));
        prompt_spans.push(Span::raw(" "));
    }
    if let Some(seed) = &listing.demo_prompt {
        prompt_spans.push(Span::styled(format!(" s: \"{}\"", seed), Style::default().fg(Color::Gray)));
    }
    frame.render_widget(Paragraph::new(Line::from(prompt_spans)), prompts_area);

    let editing = app.input_mode == InputMode::Editing;
    let input_border_color = if pending {
        Color::DarkGray
    } else if editing {
        Color::Yellow
    } else {
        Color::Gray
    };
    let input_title = if pending { " Waiting for reply... " } else { " Message " };
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(input_border_color))
        .title(input_title);

    // Keep the cursor visible with horizontal scrolling
    let inner_width = input_area.width.saturating_sub(2) as usize;
    let cursor_pos = app.chat_cursor;
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app
        .chat_input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();
    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);
    frame.render_widget(input, input_area);

    if editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((input_area.x + cursor_x + 1, input_area.y + 1));
    }
}

fn render_reviews_tab(listing: &Listing, frame: &mut Frame, area: Rect) {
    let lines = vec![
        Line::from(vec![
            Span::styled(
                format!("{:.1} ", listing.rating),
                Style::default().fg(Color::Yellow).bold(),
            ),
            Span::styled(stars(listing.rating), Style::default().fg(Color::Yellow)),
        ]),
        Line::from(Span::styled(
            format!("Based on {} verified reviews", listing.reviews_count),
            Style::default().fg(Color::Gray),
        )),
        Line::default(),
        Line::from(Span::styled(
            "Individual reviews are shown to subscribers only.",
            Style::default().fg(Color::DarkGray),
        )),
    ];
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_checkout(app: &App, listing: &Listing, frame: &mut Frame, area: Rect) {
    let plan_line = |plan: Plan, label: &str, price: f64, suffix: &str| {
        let selected = app.plan == plan;
        let marker = if selected { "(•)" } else { "( )" };
        let style = if selected {
            Style::default().fg(Color::Cyan).bold()
        } else {
            Style::default().fg(Color::Gray)
        };
        Line::from(Span::styled(
            format!(" {} {:<8} ${}{}", marker, label, format_price(price), suffix),
            style,
        ))
    };

    let mut lines = vec![
        Line::from(Span::styled(" Choose a plan", Style::default().bold())),
        Line::default(),
        plan_line(Plan::Monthly, "Monthly", listing.pricing.monthly, "/mo"),
        plan_line(Plan::Yearly, "Yearly", listing.pricing.yearly, "/yr"),
        Line::default(),
    ];

    let status = match app.purchase_status() {
        PurchaseStatus::Idle => Line::from(vec![
            Span::styled(" b ", Style::default().bg(Color::Green).fg(Color::Black).bold()),
            Span::raw(" Subscribe now"),
        ]),
        PurchaseStatus::Purchasing => Line::from(Span::styled(
            format!(" Purchasing{}", dots(app.animation_frame)),
            Style::default().fg(Color::Yellow),
        )),
        PurchaseStatus::Success => Line::from(Span::styled(
            " Subscription Active!",
            Style::default().fg(Color::Green).bold(),
        )),
        PurchaseStatus::Owned => Line::from(Span::styled(
            " Already Subscribed",
            Style::default().fg(Color::Cyan).bold(),
        )),
    };
    lines.push(status);
    lines.push(Line::default());
    lines.push(Line::from(Span::styled(
        " Cancel anytime. Simulated checkout.",
        Style::default().fg(Color::DarkGray),
    )));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green))
        .title(" Checkout ");
    frame.render_widget(Paragraph::new(lines).block(block).wrap(Wrap { trim: false }), area);
}

// Create wizard

fn render_create_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [steps_area, body_area, notice_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    let mut step_spans = vec![Span::raw(" ")];
    for (step, title) in [
        (WizardStep::Idea, "Idea"),
        (WizardStep::Details, "Details"),
        (WizardStep::Review, "Review"),
    ] {
        let style = if step == app.wizard_step {
            Style::default().bg(Color::Cyan).fg(Color::Black).bold()
        } else if step.number() < app.wizard_step.number() {
            Style::default().fg(Color::Green)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        step_spans.push(Span::styled(format!(" {}. {} ", step.number(), title), style));
        step_spans.push(Span::raw(" "));
    }
    frame.render_widget(Paragraph::new(Line::from(step_spans)), steps_area);

    match app.wizard_step {
        WizardStep::Idea => render_idea_step(app, frame, body_area),
        WizardStep::Details => render_details_step(app, frame, body_area),
        WizardStep::Review => render_review_step(app, frame, body_area),
    }

    if let Some(notice) = &app.wizard_notice {
        frame.render_widget(
            Paragraph::new(Span::styled(format!(" {}", notice), Style::default().fg(Color::Red))),
            notice_area,
        );
    }
}

fn render_idea_step(app: &App, frame: &mut Frame, area: Rect) {
    let [intro_area, input_area, status_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(5),
        Constraint::Min(0),
    ])
    .areas(area);

    let intro = Paragraph::new(vec![
        Line::from(Span::styled(" List a new agent", Style::default().fg(Color::Yellow).bold())),
        Line::from(Span::styled(
            " Describe what it does in a sentence and let the model draft the listing.",
            Style::default().fg(Color::Gray),
        )),
    ]);
    frame.render_widget(intro, intro_area);

    let editing = app.input_mode == InputMode::Editing;
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if editing { Color::Yellow } else { Color::DarkGray }))
        .title(" Your idea ");
    let idea = if app.idea_input.is_empty() && !editing {
        Paragraph::new("e.g. An agent that books sales meetings from inbound email")
            .style(Style::default().fg(Color::DarkGray))
    } else {
        Paragraph::new(app.idea_input.as_str()).style(Style::default().fg(Color::Cyan))
    };
    frame.render_widget(idea.block(block).wrap(Wrap { trim: false }), input_area);

    if editing {
        let inner_width = input_area.width.saturating_sub(2).max(1);
        let len = app.idea_input.chars().count() as u16;
        frame.set_cursor_position((
            input_area.x + 1 + len % inner_width,
            input_area.y + 1 + len / inner_width,
        ));
    }

    if app.drafting() {
        frame.render_widget(
            Paragraph::new(Span::styled(
                format!(" Drafting your listing{}", dots(app.animation_frame)),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC),
            )),
            status_area,
        );
    }
}

fn render_details_step(app: &App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Listing details ");
    let inner = block.inner(area);

    let selected = app.selected_draft_field();
    let editing = app.input_mode == InputMode::Editing;

    let lines: Vec<Line> = app
        .draft_fields()
        .into_iter()
        .map(|field| {
            let is_selected = field == selected;
            let label_style = if is_selected {
                Style::default().fg(Color::Black).bg(Color::Cyan).bold()
            } else {
                Style::default().fg(Color::Gray)
            };
            let mut value = app.draft_field_value(field);
            if field == DraftField::Sector {
                value = format!("< {} >", value);
            }
            let value_style = if is_selected && editing {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default()
            };
            Line::from(vec![
                Span::styled(
                    format!("{:<width$}", field.label(), width = FIELD_LABEL_WIDTH as usize - 1),
                    label_style,
                ),
                Span::raw(" "),
                Span::styled(value, value_style),
            ])
        })
        .collect();

    // Keep the selected row on screen
    let scroll = (app.draft_field_idx as u16).saturating_sub(inner.height.saturating_sub(1));
    frame.render_widget(Paragraph::new(lines).block(block).scroll((scroll, 0)), area);

    if editing {
        let row = app.draft_field_idx as u16 - scroll;
        let col = FIELD_LABEL_WIDTH + app.draft_field_value(selected).chars().count() as u16;
        frame.set_cursor_position((
            inner.x + col.min(inner.width.saturating_sub(1)),
            inner.y + row,
        ));
    }
}

fn render_review_step(app: &App, frame: &mut Frame, area: Rect) {
    let draft = &app.draft;
    let mut lines = vec![
        Line::from(Span::styled(draft.name.clone(), Style::default().fg(Color::Yellow).bold())),
        Line::from(Span::styled(
            draft.tagline.clone(),
            Style::default().add_modifier(Modifier::ITALIC),
        )),
        Line::from(Span::styled(draft.sector.to_string(), Style::default().fg(Color::Magenta))),
        Line::from(Span::styled(
            format!(
                "${}/mo  ·  ${}/yr",
                format_price(draft.monthly_price),
                format_price(draft.yearly_price)
            ),
            Style::default().fg(Color::Green),
        )),
        Line::default(),
        Line::from(draft.description.clone()),
        Line::default(),
    ];
    for capability in draft.filled_capabilities() {
        lines.push(Line::from(vec![
            Span::styled("  ✓ ", Style::default().fg(Color::Green)),
            Span::raw(capability.to_string()),
        ]));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green))
        .title(" Preview: press Enter to publish ");
    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
        area,
    );
}

// Dashboard

fn render_dashboard_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [tabs_area, body_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
    ])
    .areas(area);

    let selected_tab = DashboardTab::all()
        .iter()
        .position(|tab| *tab == app.dashboard_tab)
        .unwrap_or(0);
    let tabs = Tabs::new(DashboardTab::all().iter().map(|tab| tab.title()))
        .select(selected_tab)
        .style(Style::default().fg(Color::Gray))
        .highlight_style(Style::default().fg(Color::Cyan).bold().underlined());
    frame.render_widget(tabs, tabs_area);

    match (app.session.role, app.dashboard_tab) {
        (UserRole::Buyer, DashboardTab::Overview) => render_buyer_overview(app, frame, body_area),
        (UserRole::Creator, DashboardTab::Overview) => render_creator_overview(frame, body_area),
        (_, DashboardTab::Activity) => render_activity(app, frame, body_area),
        (_, DashboardTab::Billing) => render_billing(app, frame, body_area),
    }
}

fn stat_block<'a>(title: &'a str, value: String, color: Color) -> Paragraph<'a> {
    Paragraph::new(vec![
        Line::from(Span::styled(title, Style::default().fg(Color::Gray))),
        Line::from(Span::styled(value, Style::default().fg(color).bold())),
    ])
    .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::DarkGray)))
}

fn render_buyer_overview(app: &mut App, frame: &mut Frame, area: Rect) {
    let [stats_area, list_area] = Layout::vertical([
        Constraint::Length(4),
        Constraint::Min(0),
    ])
    .areas(area);

    let [agents_area, spend_area] = Layout::horizontal([
        Constraint::Percentage(50),
        Constraint::Percentage(50),
    ])
    .areas(stats_area);

    frame.render_widget(
        stat_block("Active agents", app.session.ledger.len().to_string(), Color::Cyan),
        agents_area,
    );
    frame.render_widget(
        stat_block("Monthly spend", format!("${}", format_price(app.monthly_spend())), Color::Green),
        spend_area,
    );

    app.list_area = Some(list_area);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" My agents ");

    let items: Vec<ListItem> = app
        .owned_listings()
        .into_iter()
        .map(|listing| {
            ListItem::new(Line::from(vec![
                Span::styled(listing.name.clone(), Style::default().bold()),
                Span::styled(format!("  {}", listing.sector), Style::default().fg(Color::Magenta)),
                Span::styled("  Active", Style::default().fg(Color::Green)),
            ]))
        })
        .collect();

    if items.is_empty() {
        let empty = Paragraph::new("No subscriptions yet. Browse the marketplace to find an agent.")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(empty, list_area);
        return;
    }

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");
    frame.render_stateful_widget(list, list_area, &mut app.owned_state);
}

fn render_creator_overview(frame: &mut Frame, area: Rect) {
    let [stats_area, chart_area] = Layout::vertical([
        Constraint::Length(4),
        Constraint::Min(0),
    ])
    .areas(area);

    let [revenue_area, users_area, rating_area] = Layout::horizontal([
        Constraint::Ratio(1, 3),
        Constraint::Ratio(1, 3),
        Constraint::Ratio(1, 3),
    ])
    .areas(stats_area);

    let total: u64 = REVENUE.iter().sum();
    frame.render_widget(stat_block("Total revenue", format!("${}", total), Color::Green), revenue_area);
    frame.render_widget(stat_block("Active users", "1,240".to_string(), Color::Cyan), users_area);
    frame.render_widget(stat_block("Avg. rating", "4.8".to_string(), Color::Yellow), rating_area);

    let sparkline = Sparkline::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray))
                .title(format!(
                    " Revenue {}-{} ",
                    REVENUE_MONTHS[0],
                    REVENUE_MONTHS[REVENUE_MONTHS.len() - 1]
                )),
        )
        .data(&REVENUE)
        .style(Style::default().fg(Color::Green));
    frame.render_widget(sparkline, chart_area);
}

fn render_activity(app: &App, frame: &mut Frame, area: Rect) {
    let lines: Vec<Line> = match app.session.role {
        UserRole::Buyer => {
            let owned = app.owned_listings();
            if owned.is_empty() {
                vec![Line::from(Span::styled(
                    "No activity this session.",
                    Style::default().fg(Color::DarkGray),
                ))]
            } else {
                owned
                    .iter()
                    .rev()
                    .map(|listing| {
                        Line::from(vec![
                            Span::styled("● ", Style::default().fg(Color::Green)),
                            Span::raw(format!("Subscribed to {}", listing.name)),
                        ])
                    })
                    .collect()
            }
        }
        UserRole::Creator => REVENUE_MONTHS
            .iter()
            .zip(REVENUE.iter())
            .rev()
            .map(|(month, amount)| {
                Line::from(vec![
                    Span::styled("● ", Style::default().fg(Color::Cyan)),
                    Span::raw(format!("{}: payout of ${} processed", month, amount)),
                ])
            })
            .collect(),
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Recent activity ");
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_billing(app: &App, frame: &mut Frame, area: Rect) {
    let mut lines: Vec<Line> = Vec::new();
    match app.session.role {
        UserRole::Buyer => {
            for listing in app.owned_listings() {
                lines.push(Line::from(vec![
                    Span::raw(format!("{:<24}", listing.name)),
                    Span::styled(
                        format!("${}/mo", format_price(listing.pricing.monthly)),
                        Style::default().fg(Color::Green),
                    ),
                ]));
            }
            if !lines.is_empty() {
                lines.push(Line::default());
            }
            lines.push(Line::from(vec![
                Span::styled(format!("{:<24}", "Total"), Style::default().bold()),
                Span::styled(
                    format!("${}/mo", format_price(app.monthly_spend())),
                    Style::default().fg(Color::Green).bold(),
                ),
            ]));
        }
        UserRole::Creator => {
            lines.push(Line::from("Payouts go to the account on file every month."));
            lines.push(Line::from(Span::styled(
                format!("Next payout estimate: ${}", REVENUE[REVENUE.len() - 1]),
                Style::default().fg(Color::Green),
            )));
        }
    }
    lines.push(Line::default());
    lines.push(Line::from(Span::styled(
        "Payments are simulated; no card is ever charged.",
        Style::default().fg(Color::DarkGray),
    )));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Billing ");
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_markdown_bold() {
        let line = parse_markdown_line("Setup takes **two days** at most");
        assert_eq!(line.spans.len(), 3);
        assert_eq!(line.spans[1].content, "two days");
        assert!(line.spans[1].style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_parse_markdown_bullet_and_unclosed() {
        let bullet = parse_markdown_line("- Lead scoring");
        assert_eq!(bullet.spans[0].content, "  • ");
        assert_eq!(bullet.spans[1].content, "Lead scoring");

        let unclosed = parse_markdown_line("a **b");
        assert_eq!(unclosed.spans.len(), 1);
        assert_eq!(unclosed.spans[0].content, "a **b");
    }

    #[test]
    fn test_stars() {
        assert_eq!(stars(4.8), "★★★★★");
        assert_eq!(stars(3.2), "★★★☆☆");
    }

    #[test]
    fn test_centered_clamps_to_area() {
        let area = Rect::new(0, 0, 20, 4);
        let rect = centered(area, 50, 5);
        assert_eq!(rect, area);
    }
}

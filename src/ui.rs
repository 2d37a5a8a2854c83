use anyhow::Result;
use card_tracker::entities::bank::BankRegistry;
use card_tracker::entities::institution::{Institution, InvestmentType};
use card_tracker::entities::payment::CardPayment;
use card_tracker::entities::savings::Savings;
use card_tracker::filters::{DueDateFilter, InvestmentFilter, SavingsFilter};
use card_tracker::period::days_until;
use card_tracker::returns::{savings_with_returns, ReturnPeriod, ReturnsSummary, SavingsReturn};
use chrono::NaiveDate;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Payments,
    Savings,
    Returns,
}

impl Page {
    pub const ALL: [Page; 3] = [Page::Payments, Page::Savings, Page::Returns];

    pub fn next(&self) -> Self {
        match self {
            Page::Payments => Page::Savings,
            Page::Savings => Page::Returns,
            Page::Returns => Page::Payments,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Payments => Page::Returns,
            Page::Savings => Page::Payments,
            Page::Returns => Page::Savings,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Payments => "Payments",
            Page::Savings => "Savings",
            Page::Returns => "Returns",
        }
    }
}

/// Everything the dashboard shows, loaded once at startup
pub struct DashboardData {
    pub today: NaiveDate,
    pub banks: BankRegistry,
    pub payments: Vec<CardPayment>,
    pub institutions: Vec<Institution>,
    pub savings: Vec<Savings>,
}

pub struct App {
    pub data: DashboardData,
    pub current_page: Page,
    pub show_detail: bool,

    pub due_filter: DueDateFilter,
    pub visible_payments: Vec<CardPayment>,
    pub payments_state: TableState,

    pub savings_filter: SavingsFilter,
    pub visible_savings: Vec<Savings>,
    pub savings_state: TableState,

    pub return_period: ReturnPeriod,
    pub returns: Vec<SavingsReturn>,
    pub returns_state: TableState,
}

impl App {
    pub fn new(data: DashboardData, due_filter: DueDateFilter) -> Self {
        let returns = savings_with_returns(&data.savings, &data.institutions);

        let mut app = Self {
            data,
            current_page: Page::Payments,
            show_detail: false,
            due_filter,
            visible_payments: Vec::new(),
            payments_state: TableState::default(),
            savings_filter: SavingsFilter::default(),
            visible_savings: Vec::new(),
            savings_state: TableState::default(),
            return_period: ReturnPeriod::Monthly,
            returns,
            returns_state: TableState::default(),
        };
        app.refresh_payments();
        app.refresh_savings();
        select_first(&mut app.returns_state, app.returns.len());
        app
    }

    pub fn set_due_filter(&mut self, filter: DueDateFilter) {
        self.due_filter = filter;
        self.refresh_payments();
    }

    fn refresh_payments(&mut self) {
        self.visible_payments = self.due_filter.apply(&self.data.payments, self.data.today);
        select_first(&mut self.payments_state, self.visible_payments.len());
    }

    /// All -> Card -> Stocks -> Crypto -> CETES -> All
    pub fn cycle_investment_filter(&mut self) {
        let types = InvestmentType::ALL;
        self.savings_filter.investment_type = match self.savings_filter.investment_type {
            InvestmentFilter::All => InvestmentFilter::Only(types[0]),
            InvestmentFilter::Only(current) => {
                match types.iter().position(|t| *t == current) {
                    Some(i) if i + 1 < types.len() => InvestmentFilter::Only(types[i + 1]),
                    _ => InvestmentFilter::All,
                }
            }
        };
        self.refresh_savings();
    }

    pub fn cycle_sort(&mut self) {
        self.savings_filter.sort = self.savings_filter.sort.next();
        self.refresh_savings();
    }

    fn refresh_savings(&mut self) {
        self.visible_savings = self
            .savings_filter
            .apply(&self.data.savings, &self.data.institutions);
        select_first(&mut self.savings_state, self.visible_savings.len());
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
    }

    pub fn selected_payment(&self) -> Option<&CardPayment> {
        self.payments_state
            .selected()
            .and_then(|i| self.visible_payments.get(i))
    }

    fn institution_name(&self, id: i64) -> &str {
        self.data
            .institutions
            .iter()
            .find(|i| i.id == id)
            .map(|i| i.name.as_str())
            .unwrap_or("?")
    }

    fn current_list(&mut self) -> (&mut TableState, usize) {
        match self.current_page {
            Page::Payments => (&mut self.payments_state, self.visible_payments.len()),
            Page::Savings => (&mut self.savings_state, self.visible_savings.len()),
            Page::Returns => (&mut self.returns_state, self.returns.len()),
        }
    }

    pub fn next(&mut self) {
        self.move_selection(1);
    }

    pub fn previous(&mut self) {
        self.move_selection(-1);
    }

    pub fn page_down(&mut self) {
        self.move_selection(20);
    }

    pub fn page_up(&mut self) {
        self.move_selection(-20);
    }

    /// Single steps wrap around; larger jumps stop at the ends
    fn move_selection(&mut self, delta: i64) {
        let (state, len) = self.current_list();
        if len == 0 {
            return;
        }
        let last = len as i64 - 1;
        let current = state.selected().unwrap_or(0) as i64;
        let target = current + delta;

        let i = if delta.abs() == 1 {
            if target > last {
                0
            } else if target < 0 {
                last
            } else {
                target
            }
        } else {
            target.clamp(0, last)
        };
        state.select(Some(i as usize));
    }

    pub fn select_last(&mut self) {
        let (state, len) = self.current_list();
        if len > 0 {
            state.select(Some(len - 1));
        }
    }

    pub fn select_top(&mut self) {
        let (state, len) = self.current_list();
        select_first(state, len);
    }
}

fn select_first(state: &mut TableState, len: usize) {
    state.select(if len == 0 { None } else { Some(0) });
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Tab => {
                    if key.modifiers.contains(KeyModifiers::SHIFT) {
                        app.previous_page();
                    } else {
                        app.next_page();
                    }
                }
                KeyCode::BackTab => app.previous_page(),
                KeyCode::Enter if app.current_page == Page::Payments => app.toggle_detail(),
                KeyCode::Char(c @ '1'..='4') if app.current_page == Page::Payments => {
                    let idx = c as usize - '1' as usize;
                    app.set_due_filter(DueDateFilter::ALL[idx]);
                }
                KeyCode::Char('t') if app.current_page == Page::Savings => app.cycle_investment_filter(),
                KeyCode::Char('s') if app.current_page == Page::Savings => app.cycle_sort(),
                KeyCode::Char('d') if app.current_page == Page::Returns => app.return_period = ReturnPeriod::Daily,
                KeyCode::Char('w') if app.current_page == Page::Returns => app.return_period = ReturnPeriod::Weekly,
                KeyCode::Char('m') if app.current_page == Page::Returns => app.return_period = ReturnPeriod::Monthly,
                KeyCode::Char('a') if app.current_page == Page::Returns => app.return_period = ReturnPeriod::Annual,
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::PageDown => app.page_down(),
                KeyCode::PageUp => app.page_up(),
                KeyCode::Home => app.select_top(),
                KeyCode::End => app.select_last(),
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    match app.current_page {
        Page::Payments if app.show_detail => {
            let content_chunks = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
                .split(chunks[1]);

            render_payments(f, content_chunks[0], app);
            render_payment_detail(f, content_chunks[1], app);
        }
        Page::Payments => render_payments(f, chunks[1], app),
        Page::Savings => render_savings(f, chunks[1], app),
        Page::Returns => render_returns(f, chunks[1], app),
    }

    render_status_bar(f, chunks[2], app);
}

fn header_style() -> Style {
    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
}

fn header_row(titles: &[&'static str]) -> Row<'static> {
    Row::new(titles.iter().map(|h| Cell::from(*h).style(header_style())))
        .style(Style::default().bg(Color::DarkGray))
        .height(1)
}

fn highlight_style() -> Style {
    Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD)
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut tab_spans = vec![];
    for (i, page) in Page::ALL.iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(page.title(), style));
    }

    let pending: f64 = app
        .data
        .payments
        .iter()
        .filter(|p| !p.is_paid)
        .map(|p| p.debt)
        .sum();
    let saved: f64 = app.data.savings.iter().map(|s| s.current_value()).sum();

    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Pending: ${:.2}", pending),
        Style::default().fg(Color::Red),
    ));
    tab_spans.push(Span::raw("  "));
    tab_spans.push(Span::styled(
        format!("Saved: ${:.2}", saved),
        Style::default().fg(Color::Green),
    ));
    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        app.data.today.to_string(),
        Style::default().fg(Color::White),
    ));

    let header = Paragraph::new(vec![Line::from(tab_spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn due_color(days: i64, is_paid: bool) -> Color {
    match days {
        _ if is_paid => Color::DarkGray,
        d if d < 0 => Color::Red,
        d if d <= 3 => Color::LightRed,
        d if d <= 7 => Color::Yellow,
        _ => Color::White,
    }
}

fn render_payments(f: &mut Frame, area: Rect, app: &mut App) {
    let today = app.data.today;
    let rows: Vec<Row> = app
        .visible_payments
        .iter()
        .map(|p| {
            let days = days_until(today, p.due_date);
            let color = due_color(days, p.is_paid);
            let label = p
                .installment
                .as_ref()
                .map(|m| format!("{} {}", m.label(), m.description))
                .or_else(|| p.note.clone())
                .unwrap_or_default();

            Row::new(vec![
                Cell::from(p.due_date.to_string()).style(Style::default().fg(color)),
                Cell::from(truncate(app.data.banks.name_of(p.bank_id).unwrap_or("?"), 16)),
                Cell::from(format!("{:.2}", p.debt)).style(Style::default().fg(color)),
                Cell::from(p.minimum_payment.map(|m| format!("{:.2}", m)).unwrap_or_default()),
                Cell::from(if p.is_paid { "paid".to_string() } else { format!("{}d", days) })
                    .style(Style::default().fg(color)),
                Cell::from(truncate(&label, 30)),
            ])
            .height(1)
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(12),
            Constraint::Length(18),
            Constraint::Length(12),
            Constraint::Length(10),
            Constraint::Length(7),
            Constraint::Min(10),
        ],
    )
    .header(header_row(&["Due", "Bank", "Debt", "Minimum", "Days", "Note / MSI"]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(format!(" Payments ({}) ", app.due_filter.label())),
    )
    .highlight_style(highlight_style())
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.payments_state);
}

fn detail_line(label: &str, value: String) -> Line<'static> {
    Line::from(vec![
        Span::styled(
            format!("  {}: ", label),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::raw(value),
    ])
}

fn render_payment_detail(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Payment Details ");

    let payment = match app.selected_payment() {
        Some(p) => p,
        None => {
            f.render_widget(Paragraph::new("No payment selected").block(block), area);
            return;
        }
    };

    let bank = app.data.banks.find_by_id(payment.bank_id);
    let mut content = vec![
        Line::from(""),
        detail_line("Bank", bank.map(|b| b.name.clone()).unwrap_or_else(|| "?".to_string())),
        detail_line("Card", payment.card_type.clone()),
        detail_line("Period", payment.period().to_string()),
        detail_line("Due", payment.due_date.to_string()),
        detail_line("Debt", format!("${:.2}", payment.debt)),
        detail_line(
            "Minimum",
            payment
                .minimum_payment
                .map(|m| format!("${:.2}", m))
                .unwrap_or_else(|| "-".to_string()),
        ),
    ];

    if let Some(usage) = bank.and_then(|b| b.credit_usage(payment.debt)) {
        content.push(Line::from(""));
        content.push(detail_line("Limit", format!("${:.2}", usage.limit)));
        content.push(detail_line("Available", format!("${:.2}", usage.available)));
        content.push(detail_line("Usage", format!("{}% ({:?})", usage.percent, usage.level)));
    }

    if let Some(msi) = &payment.installment {
        content.push(Line::from(""));
        content.push(Line::from("  ─────────────────────────────────────"));
        content.push(detail_line("MSI", msi.label()));
        content.push(detail_line("Purchase", msi.description.clone()));
        content.push(detail_line("Total", format!("${:.2}", msi.total_amount)));
        content.push(detail_line("Monthly", format!("${:.2}", msi.monthly_amount)));
    }

    if let Some(note) = &payment.note {
        content.push(Line::from(""));
        content.push(detail_line("Note", note.clone()));
    }

    f.render_widget(Paragraph::new(content).block(block), area);
}

fn render_savings(f: &mut Frame, area: Rect, app: &mut App) {
    let rows: Vec<Row> = app
        .visible_savings
        .iter()
        .map(|s| {
            let kind = s.value.investment_type();
            let detail = match &s.value {
                card_tracker::SavingsValue::Stocks { quantity, ticker, .. }
                | card_tracker::SavingsValue::Crypto { quantity, ticker, .. } => {
                    format!("{} x {}", quantity, ticker.as_deref().unwrap_or("-"))
                }
                card_tracker::SavingsValue::Cetes { term_days: Some(days), .. } => {
                    format!("{} days", days)
                }
                _ => String::new(),
            };

            Row::new(vec![
                Cell::from(s.created_on.to_string()),
                Cell::from(truncate(&s.name, 24)),
                Cell::from(truncate(app.institution_name(s.institution_id), 16)),
                Cell::from(kind.as_str()),
                Cell::from(format!("{:.2}", s.current_value())).style(Style::default().fg(Color::Green)),
                Cell::from(detail),
            ])
            .height(1)
        })
        .collect();

    let type_label = match app.savings_filter.investment_type {
        InvestmentFilter::All => "All".to_string(),
        InvestmentFilter::Only(t) => t.to_string(),
    };

    let table = Table::new(
        rows,
        [
            Constraint::Length(12),
            Constraint::Length(26),
            Constraint::Length(18),
            Constraint::Length(8),
            Constraint::Length(14),
            Constraint::Min(10),
        ],
    )
    .header(header_row(&["Created", "Name", "Institution", "Type", "Value", "Detail"]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(format!(
                " Savings ({} | {}) ",
                type_label,
                app.savings_filter.sort.label()
            )),
    )
    .highlight_style(highlight_style())
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.savings_state);
}

fn render_returns(f: &mut Frame, area: Rect, app: &mut App) {
    let period = app.return_period;
    let summary = ReturnsSummary::from_returns(&app.returns, period);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(0)])
        .split(area);

    let totals = Paragraph::new(vec![
        detail_line("Invested", format!("${:.2}", summary.total_invested)),
        detail_line(
            &format!("Yield ({})", period.label()),
            format!("${:.2}", summary.total_yield),
        ),
    ])
    .block(Block::default().borders(Borders::ALL).title(" Projected Returns "));
    f.render_widget(totals, chunks[0]);

    let rows: Vec<Row> = app
        .returns
        .iter()
        .map(|r| {
            let amount = r.returns.for_period(period);
            Row::new(vec![
                Cell::from(truncate(&r.savings.name, 24)),
                Cell::from(truncate(&r.institution.name, 16)),
                Cell::from(format!("{:.2}%", r.annual_rate)),
                Cell::from(format!("{:.2}", r.amount)),
                Cell::from(format!("{:.2}", amount)).style(Style::default().fg(Color::Green)),
                Cell::from(bar(amount, summary.max_yield, 20)).style(Style::default().fg(Color::Green)),
            ])
            .height(1)
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(26),
            Constraint::Length(18),
            Constraint::Length(8),
            Constraint::Length(14),
            Constraint::Length(12),
            Constraint::Min(10),
        ],
    )
    .header(header_row(&["Savings", "Institution", "Rate", "Principal", "Yield", ""]))
    .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::White)))
    .highlight_style(highlight_style())
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, chunks[1], &mut app.returns_state);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &mut App) {
    let (state, total) = app.current_list();
    let selected = state.selected().map(|i| i + 1).unwrap_or(0);

    let mut status_spans = vec![Span::styled(
        format!(" Row: {}/{} ", selected, total),
        Style::default().fg(Color::Cyan),
    )];

    let keys: &[(&str, &str)] = match app.current_page {
        Page::Payments => &[("1-4", " Window | "), ("Enter", " Details | ")],
        Page::Savings => &[("t", " Type | "), ("s", " Sort | ")],
        Page::Returns => &[("d/w/m/a", " Period | ")],
    };

    status_spans.push(Span::raw(" | "));
    for (key, label) in keys {
        status_spans.push(Span::styled(*key, Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(*label));
    }
    status_spans.push(Span::styled("Tab", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Page | "));
    status_spans.push(Span::styled("↑/↓", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Nav | "));
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

fn bar(value: f64, max: f64, width: usize) -> String {
    if max <= 0.0 || value <= 0.0 {
        return String::new();
    }
    let filled = ((value / max) * width as f64).round() as usize;
    "█".repeat(filled.min(width))
}

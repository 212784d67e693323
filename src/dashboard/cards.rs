//! One card renderer per record kind.
//!
//! Every card shows a title, a few labelled rows and a footer date, and opens
//! the matching Odoo form in a new tab when the record has an ID.

use maud::{Markup, html};

use crate::{
    PanelKind, Record,
    format::{
        CURRENCY_CODE, CurrencyOptions, abbreviate_bank_name, format_currency, format_date_time,
        format_name_display, format_relation, format_warehouse_display, format_whole_number,
    },
};

/// What the card renderers need besides the record itself.
#[derive(Debug, Clone, Copy)]
pub struct CardContext<'a> {
    /// The Odoo web client cards link to, e.g. "https://erp.example.com".
    pub odoo_base_url: &'a str,
}

/// The Odoo form view URL for record `id` of `model`.
pub fn deep_link(odoo_base_url: &str, model: &str, id: &str) -> String {
    format!(
        "{}/web#id={id}&view_type=form&model={model}",
        odoo_base_url.trim_end_matches('/')
    )
}

struct CardRow {
    label: String,
    value: String,
    muted: bool,
}

impl CardRow {
    fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            muted: false,
        }
    }

    fn muted(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            muted: true,
            ..Self::new(label, value)
        }
    }
}

struct Card {
    title: String,
    rows: Vec<CardRow>,
    footer: String,
    link: Option<String>,
}

fn card_view(card: &Card) -> Markup {
    let body = html! {
        div class="card-title" { (card.title) }

        @for row in &card.rows {
            div class="card-row"
            {
                span class="card-label" { (row.label) }
                span class={ "card-value" @if row.muted { " muted" } } { (row.value) }
            }
        }

        div class="card-footer"
        {
            span { (card.footer) }
        }
    };

    match &card.link {
        Some(link) => html! {
            a class="card" href=(link) target="_blank" rel="noopener noreferrer" { (body) }
        },
        None => html! {
            div class="card" { (body) }
        },
    }
}

fn link_for(record: &Record, context: &CardContext<'_>, model: &str) -> Option<String> {
    record
        .display("id")
        .map(|id| deep_link(context.odoo_base_url, model, &id))
}

/// Render the card for a record of `panel`.
pub fn render_card(panel: PanelKind, record: &Record, context: &CardContext<'_>) -> Markup {
    match panel {
        PanelKind::Invoice => invoice_card(record, context),
        PanelKind::Journal => journal_card(record, context),
        PanelKind::Quotation => quotation_card(record, context),
        PanelKind::Customer => customer_card(record, context),
        PanelKind::Overshoot => overshoot_card(record, context),
        PanelKind::Reconciliation => reconciliation_card(record, context),
    }
}

/// A sale order that still needs attention.
pub fn invoice_card(record: &Record, context: &CardContext<'_>) -> Markup {
    let order = record.first_text(&["ref", "name"]).unwrap_or_default();
    let status = record.text("issue").unwrap_or("Action Required");
    let date = record
        .first_text(&["date_invoice", "invoice_date", "date_order"])
        .unwrap_or_default();

    card_view(&Card {
        title: format_relation(record.relation("partner_id")),
        rows: vec![
            CardRow::new("Order:", order),
            CardRow::muted("Status:", status),
        ],
        footer: format_date_time(date),
        link: link_for(record, context, "sale.order"),
    })
}

/// An unposted bank deposit or journal entry.
pub fn journal_card(record: &Record, context: &CardContext<'_>) -> Markup {
    let is_journal = record.text("source") == Some("journal");
    let source_label = if is_journal { "Journal" } else { "Deposit" };
    let bank = abbreviate_bank_name(record.relation("journal_id").name().unwrap_or_default());
    let from = format!("From: {bank}");

    let model = record
        .text("model")
        .unwrap_or(if is_journal { "account.move" } else { "bank.deposit" });
    let link = record
        .display("record_id")
        .or_else(|| record.display("id"))
        .map(|id| deep_link(context.odoo_base_url, model, &id));

    card_view(&Card {
        title: format_relation(record.relation("partner")),
        rows: vec![
            CardRow::new(
                "Deposit:",
                format!(
                    "{} {CURRENCY_CODE}",
                    format_whole_number(record.number("amount"))
                ),
            ),
            CardRow::muted(from.trim_end(), source_label),
        ],
        footer: format_date_time(record.text("date").unwrap_or_default()),
        link,
    })
}

/// A pending quotation.
pub fn quotation_card(record: &Record, context: &CardContext<'_>) -> Markup {
    let site = record
        .relation("warehouse_id")
        .name()
        .map(format_warehouse_display)
        .unwrap_or_else(|| "N/A".to_owned());

    card_view(&Card {
        title: format_relation(record.relation("partner_id")),
        rows: vec![
            CardRow::new("Order:", record.text("name").unwrap_or_default()),
            CardRow::new("Site:", site),
        ],
        footer: format_date_time(record.text("date_order").unwrap_or_default()),
        link: link_for(record, context, "sale.order"),
    })
}

/// A recently created customer.
pub fn customer_card(record: &Record, context: &CardContext<'_>) -> Markup {
    card_view(&Card {
        title: format_name_display(record.text("name").unwrap_or_default()),
        rows: vec![
            CardRow::new(
                "Orders:",
                record.display("order_count").unwrap_or_else(|| "0".to_owned()),
            ),
            CardRow::muted("P_CODE:", record.text("partner_code").unwrap_or("N/A")),
        ],
        footer: format_date_time(record.text("create_date").unwrap_or_default()),
        link: link_for(record, context, "res.partner"),
    })
}

/// A customer whose orders exceed their available balance.
pub fn overshoot_card(record: &Record, context: &CardContext<'_>) -> Markup {
    let title = record
        .text("partner_name")
        .map(format_name_display)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| format_relation(record.relation("partner_id")));
    let order_count = record
        .display("order_count")
        .unwrap_or_else(|| "0".to_owned());

    card_view(&Card {
        title,
        rows: vec![
            CardRow::new(
                "Available:",
                format_currency(record.number("customer_limit"), CurrencyOptions::default()),
            ),
            CardRow::new(
                format!("Orders({order_count}):"),
                format_currency(record.number("total_amount"), CurrencyOptions::default()),
            ),
            CardRow::new(
                "Delta:",
                format_currency(record.number("delta"), CurrencyOptions::signed()),
            ),
        ],
        footer: format_date_time(record.text("latest_date").unwrap_or_default()),
        link: link_for(record, context, "res.partner"),
    })
}

/// An unreconciled bank statement line.
pub fn reconciliation_card(record: &Record, context: &CardContext<'_>) -> Markup {
    card_view(&Card {
        title: format_relation(record.relation("partner_id")),
        rows: vec![CardRow::new(
            "Amount:",
            format_currency(record.number("amount"), CurrencyOptions::default()),
        )],
        footer: format_date_time(record.text("date").unwrap_or_default()),
        link: link_for(record, context, "account.bank.statement.line"),
    })
}

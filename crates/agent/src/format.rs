use aiaa_core::domain::debtor::Debtor;
use aiaa_core::domain::sales::{format_erp_date, previous_day, SalesSummary};
use aiaa_core::domain::stock::StockItem;
use aiaa_core::flows::WizardScratch;
use aiaa_core::intent::button_ids;
use aiaa_core::reply::ReplyMessage;
use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};

pub const CURRENCY: &str = "RM";
const RULE: &str = "━━━━━━━━━━━━━━━━━━";

/// `1234567.5` as `1,234,567.50`.
pub fn format_money(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let fixed = format!("{:.2}", rounded.abs());
    let (whole, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (index, digit) in whole.chars().enumerate() {
        if index > 0 && (whole.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    format!("{}{grouped}.{fraction}", if negative { "-" } else { "" })
}

pub fn format_quantity(quantity: Decimal) -> String {
    quantity.normalize().to_string()
}

/// Escapes the characters legacy Telegram Markdown treats as markup.
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '_' | '*' | '`' | '[') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

pub fn main_menu(header: &str) -> ReplyMessage {
    ReplyMessage::builder(header)
        .markdown()
        .row(|row| {
            row.button(button_ids::SALES_TODAY, "📊 Sales Today")
                .button(button_ids::SALES_YESTERDAY, "📉 Sales Yesterday");
        })
        .row(|row| {
            row.button(button_ids::TOP_DEBTORS, "🏆 Top 5 Debtors")
                .button(button_ids::DEBTOR_LIST, "👥 Customer List");
        })
        .row(|row| {
            row.button(button_ids::STOCK_LIST, "📦 Stock List")
                .button(button_ids::HELP_INFO, "💡 Help");
        })
        .row(|row| {
            row.button(button_ids::NEW_INVOICE, "🧾 New Invoice")
                .button(button_ids::NEW_DEBTOR, "➕ New Debtor");
        })
        .build()
}

pub fn welcome() -> ReplyMessage {
    main_menu(
        "🤖 *AutoCount AI Dashboard*\nSelect an option below or type your request naturally.\n_(e.g., 'Check stock for iPhone', 'Sales yesterday')_",
    )
}

pub fn not_understood() -> ReplyMessage {
    main_menu("I'm not sure how to help with that. Try checking stock or sales, or pick an option below.")
}

pub fn help() -> ReplyMessage {
    ReplyMessage::markdown(
        "💡 *How to use AutoCount AI*\n\n\
         1. *Use the Buttons*: tap a menu option for quick reports.\n\
         2. *Chat Naturally*:\n\
         • 'Check stock for iPhone'\n\
         • 'Show debtor ABC Company'\n\
         • 'Sales for 2026/01/29'\n\
         • 'List top 5 debtors'\n\
         3. *Create records*: /invoice or /debtor, /cancel to stop.",
    )
}

pub fn stock_card(item: &StockItem) -> ReplyMessage {
    ReplyMessage::markdown(format!(
        "📦 *{description}*\n🔢 Code: `{code}`\n📊 Stock: {quantity} {uom}\n{RULE}\n💵 Price: {CURRENCY} {price}\n🛠 Cost: {CURRENCY} {cost}\n📂 Group: {group} | Type: {item_type}",
        description = escape_markdown(&item.description),
        code = item.code,
        quantity = format_quantity(item.quantity),
        uom = escape_markdown(&item.unit_of_measure),
        price = format_money(item.price),
        cost = format_money(item.cost),
        group = escape_markdown(item.group.as_deref().unwrap_or("N/A")),
        item_type = escape_markdown(item.item_type.as_deref().unwrap_or("N/A")),
    ))
}

pub fn stock_not_found(keyword: &str) -> ReplyMessage {
    ReplyMessage::plain(format!("❌ Item '{keyword}' not found."))
}

pub fn stock_list(items: &[StockItem]) -> ReplyMessage {
    if items.is_empty() {
        return ReplyMessage::plain("📦 No stock items found.");
    }

    let mut text = String::from("📦 *Stock Catalog*\n");
    for item in items {
        text.push_str(&format!(
            "• {} : {}\n",
            escape_markdown(&item.description),
            format_quantity(item.quantity)
        ));
    }
    ReplyMessage::markdown(text)
}

pub fn debtor_card(debtor: &Debtor) -> ReplyMessage {
    ReplyMessage::markdown(format!(
        "👤 *{name}*\n🆔 `{code}`\n💰 Bal: {CURRENCY} {balance}\n📍 {address}\n📞 {phone} | 📠 {fax}\n💳 Limit: {CURRENCY} {limit} | 📅 Term: {term}",
        name = escape_markdown(&debtor.company_name),
        code = debtor.account_no,
        balance = format_money(debtor.balance),
        address = escape_markdown(debtor.address.as_deref().unwrap_or("N/A")),
        phone = escape_markdown(debtor.phone.as_deref().unwrap_or("N/A")),
        fax = escape_markdown(debtor.fax.as_deref().unwrap_or("N/A")),
        limit = format_money(debtor.credit_limit),
        term = escape_markdown(debtor.credit_term.as_deref().unwrap_or("N/A")),
    ))
}

pub fn debtor_not_found(keyword: &str) -> ReplyMessage {
    ReplyMessage::plain(format!("❌ Debtor '{keyword}' not found."))
}

pub fn debtor_directory(debtors: &[Debtor]) -> ReplyMessage {
    if debtors.is_empty() {
        return ReplyMessage::plain("👥 No customers found.");
    }

    let mut text = String::from("👥 *Customer Directory*\n");
    for debtor in debtors {
        text.push_str(&format!("• `{}` {}\n", debtor.account_no, escape_markdown(&debtor.company_name)));
    }
    ReplyMessage::markdown(text)
}

pub fn top_debtors(debtors: &[Debtor]) -> ReplyMessage {
    if debtors.is_empty() {
        return ReplyMessage::plain("✅ No outstanding debtors found.");
    }

    let mut text = format!("🏆 *Top {} Debtors*\n", debtors.len());
    for debtor in debtors {
        text.push_str(&format!(
            "• {}: {CURRENCY} {}\n",
            escape_markdown(&debtor.company_name),
            format_money(debtor.balance)
        ));
    }
    ReplyMessage::markdown(text)
}

pub fn sales_report(summary: &SalesSummary, today: NaiveDate) -> ReplyMessage {
    let date = format_erp_date(summary.date);
    let title = if summary.date == today {
        format!("Today ({date})")
    } else if summary.date == previous_day(today) {
        format!("Yesterday ({date})")
    } else {
        date
    };
    let difference = summary.difference();
    let trend = if difference < Decimal::ZERO { "📉" } else { "📈" };

    ReplyMessage::markdown(format!(
        "📅 *Sales: {title}*\n💵 Revenue: {CURRENCY} {revenue}\n🧾 Invoices: {count}\n({trend} vs Prev Day: {CURRENCY} {difference})",
        revenue = format_money(summary.revenue),
        count = summary.invoice_count,
        difference = format_money(difference),
    ))
}

pub fn unreadable_date(raw: &str) -> ReplyMessage {
    ReplyMessage::plain(format!(
        "📅 I couldn't read the date '{raw}'. Use YYYY/MM/DD, 'today' or 'yesterday'."
    ))
}

pub fn prompt_debtor() -> ReplyMessage {
    ReplyMessage::plain("🧾 New invoice. Enter the debtor code (e.g. 300-A001), or /cancel to stop.")
}

pub fn prompt_item() -> ReplyMessage {
    ReplyMessage::plain("📦 Enter the item code.")
}

pub fn prompt_quantity(scratch: &WizardScratch) -> ReplyMessage {
    let description = scratch.description.as_deref().unwrap_or("unknown");
    let price = scratch.unit_price.map(format_money).unwrap_or_else(|| format_money(Decimal::ZERO));
    ReplyMessage::plain(format!("🔢 {description} @ {CURRENCY} {price}. Enter the quantity."))
}

pub fn reprompt_quantity(input: &str) -> ReplyMessage {
    ReplyMessage::plain(format!("⚠️ '{input}' is not a valid quantity. Enter a number greater than zero."))
}

pub fn prompt_name() -> ReplyMessage {
    ReplyMessage::plain("👤 New debtor. Enter the company name, or /cancel to stop.")
}

pub fn prompt_phone() -> ReplyMessage {
    ReplyMessage::plain("📞 Enter the phone number.")
}

fn with_confirm_buttons(text: String) -> ReplyMessage {
    ReplyMessage::builder(text)
        .markdown()
        .row(|row| {
            row.button(button_ids::WIZARD_CONFIRM, "✅ Confirm")
                .button(button_ids::WIZARD_CANCEL, "❌ Cancel");
        })
        .build()
}

pub fn invoice_summary(scratch: &WizardScratch) -> ReplyMessage {
    let quantity = scratch.quantity.unwrap_or(Decimal::ZERO);
    let unit_price = scratch.unit_price.unwrap_or(Decimal::ZERO);
    with_confirm_buttons(format!(
        "🧾 *Confirm Invoice*\n👤 Debtor: `{debtor}`\n📦 Item: `{item}` {description}\n🔢 Qty: {quantity}\n💵 Unit Price: {CURRENCY} {price}\n{RULE}\n💰 Total: {CURRENCY} {total}\n\nReply yes to create or no to cancel.",
        debtor = scratch.debtor_code.as_deref().unwrap_or("?"),
        item = scratch.item_code.as_deref().unwrap_or("?"),
        description = escape_markdown(scratch.description.as_deref().unwrap_or("unknown")),
        quantity = format_quantity(quantity),
        price = format_money(unit_price),
        total = format_money(quantity * unit_price),
    ))
}

pub fn debtor_summary(scratch: &WizardScratch) -> ReplyMessage {
    with_confirm_buttons(format!(
        "👤 *Confirm New Debtor*\n🏢 Company: {name}\n📞 Phone: {phone}\n\nReply yes to create or no to cancel.",
        name = escape_markdown(scratch.company_name.as_deref().unwrap_or("?")),
        phone = escape_markdown(scratch.phone.as_deref().unwrap_or("?")),
    ))
}

pub fn invoice_created(document_no: &str) -> ReplyMessage {
    ReplyMessage::markdown(format!("✅ Invoice created: `{document_no}`"))
}

pub fn debtor_created(account_no: &str) -> ReplyMessage {
    ReplyMessage::markdown(format!("✅ Debtor created: `{account_no}`"))
}

pub fn create_rejected(what: &str, raw: &str) -> ReplyMessage {
    ReplyMessage::plain(format!("❌ Failed to create {what}.\nERP response: {raw}"))
}

pub fn wizard_cancelled() -> ReplyMessage {
    main_menu("🚫 Cancelled. Nothing was saved.")
}

pub fn wizard_busy() -> ReplyMessage {
    ReplyMessage::plain("⏳ Finish or cancel your current action first (send /cancel).")
}

pub fn nothing_to_confirm() -> ReplyMessage {
    ReplyMessage::plain("There is nothing waiting for confirmation.")
}

pub fn missing_argument(question: &str) -> ReplyMessage {
    ReplyMessage::plain(format!("❓ {question}"))
}

pub fn nothing_to_cancel() -> ReplyMessage {
    ReplyMessage::plain("Nothing to cancel.")
}

pub fn error_reply(user_message: &str, correlation_id: &str) -> ReplyMessage {
    ReplyMessage::plain(format!("{user_message}\nRef: {correlation_id}"))
}

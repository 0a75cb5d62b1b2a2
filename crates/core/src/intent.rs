use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    CheckStock,
    ListStock,
    CheckDebtorInfo,
    ListCustomers,
    ListTopDebtors,
    GetSales,
    CreateInvoice,
    CreateDebtor,
    Help,
    Menu,
    Unknown,
}

impl IntentKind {
    pub const ALL: [IntentKind; 11] = [
        Self::CheckStock,
        Self::ListStock,
        Self::CheckDebtorInfo,
        Self::ListCustomers,
        Self::ListTopDebtors,
        Self::GetSales,
        Self::CreateInvoice,
        Self::CreateDebtor,
        Self::Help,
        Self::Menu,
        Self::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CheckStock => "check_stock",
            Self::ListStock => "list_stock",
            Self::CheckDebtorInfo => "check_debtor_info",
            Self::ListCustomers => "list_customers",
            Self::ListTopDebtors => "list_top_debtors",
            Self::GetSales => "get_sales",
            Self::CreateInvoice => "create_invoice",
            Self::CreateDebtor => "create_debtor",
            Self::Help => "help",
            Self::Menu => "menu",
            Self::Unknown => "unknown",
        }
    }

    /// Normalises an intent name as produced by the model. Names the model has
    /// been seen to use interchangeably map onto one kind; anything
    /// unrecognised is `Unknown`.
    pub fn from_name(name: &str) -> Self {
        let normalized = name.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "check_stock" | "get_stock" | "stock_info" => Self::CheckStock,
            "list_stock" | "stock_list" => Self::ListStock,
            "check_debtor_info" | "check_debtor" | "debtor_info" | "find_debtor" => {
                Self::CheckDebtorInfo
            }
            "list_customers" | "list_debtors" | "debtor_list" | "customer_list" => {
                Self::ListCustomers
            }
            "list_top_debtors" | "check_top_debtors" | "top_debtors" => Self::ListTopDebtors,
            "get_sales" | "check_sales" | "sales_report" => Self::GetSales,
            "create_invoice" | "new_invoice" => Self::CreateInvoice,
            "create_debtor" | "new_debtor" => Self::CreateDebtor,
            "help" | "help_info" => Self::Help,
            "menu" | "main_menu" | "start" => Self::Menu,
            _ => Self::Unknown,
        }
    }
}

/// `{intent, args}` as exchanged between the classifier and the dispatcher.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IntentResult {
    #[serde(default, deserialize_with = "null_as_default")]
    pub intent: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub args: Map<String, Value>,
}

/// Models write `null` for "nothing here"; read it as the field's default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl IntentResult {
    pub fn unknown() -> Self {
        Self { intent: IntentKind::Unknown.as_str().to_owned(), args: Map::new() }
    }

    pub fn new(kind: IntentKind) -> Self {
        Self { intent: kind.as_str().to_owned(), args: Map::new() }
    }

    pub fn with_arg(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.args.insert(key.to_owned(), value.into());
        self
    }

    pub fn kind(&self) -> IntentKind {
        IntentKind::from_name(&self.intent)
    }

    /// First non-blank argument among `keys`, numbers rendered as text.
    pub fn text_arg(&self, keys: &[&str]) -> Option<String> {
        keys.iter().filter_map(|key| self.args.get(*key)).find_map(|value| match value {
            Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_owned()),
            Value::Number(number) => Some(number.to_string()),
            _ => None,
        })
    }

    /// Positive integer argument, falling back to `default`.
    pub fn limit_arg(&self, key: &str, default: usize) -> usize {
        let parsed = match self.args.get(key) {
            Some(Value::Number(number)) => number.as_u64().map(|value| value as usize),
            Some(Value::String(text)) => text.trim().parse::<usize>().ok(),
            _ => None,
        };
        parsed.filter(|value| *value > 0).unwrap_or(default)
    }
}

/// Identifiers carried by inline buttons.
pub mod button_ids {
    pub const SALES_TODAY: &str = "sales_today";
    pub const SALES_YESTERDAY: &str = "sales_yesterday";
    pub const TOP_DEBTORS: &str = "top_debtors";
    pub const DEBTOR_LIST: &str = "debtor_list";
    pub const STOCK_LIST: &str = "stock_list";
    pub const HELP_INFO: &str = "help_info";
    pub const NEW_INVOICE: &str = "new_invoice";
    pub const NEW_DEBTOR: &str = "new_debtor";
    pub const WIZARD_CONFIRM: &str = "wizard_confirm";
    pub const WIZARD_CANCEL: &str = "wizard_cancel";
}

#[derive(Clone, Debug, PartialEq)]
pub enum ButtonAction {
    Intent(IntentResult),
    WizardConfirm,
    WizardCancel,
    Unrecognized(String),
}

impl ButtonAction {
    /// Maps a button identifier onto the dispatcher's handler set, bypassing
    /// the classifier.
    pub fn from_button(id: &str) -> Self {
        use button_ids::*;

        match id.trim() {
            SALES_TODAY => Self::Intent(IntentResult::new(IntentKind::GetSales).with_arg("date", "today")),
            SALES_YESTERDAY => {
                Self::Intent(IntentResult::new(IntentKind::GetSales).with_arg("date", "yesterday"))
            }
            TOP_DEBTORS => Self::Intent(IntentResult::new(IntentKind::ListTopDebtors).with_arg("limit", 5)),
            DEBTOR_LIST => Self::Intent(IntentResult::new(IntentKind::ListCustomers)),
            STOCK_LIST => Self::Intent(IntentResult::new(IntentKind::ListStock)),
            HELP_INFO => Self::Intent(IntentResult::new(IntentKind::Help)),
            NEW_INVOICE => Self::Intent(IntentResult::new(IntentKind::CreateInvoice)),
            NEW_DEBTOR => Self::Intent(IntentResult::new(IntentKind::CreateDebtor)),
            WIZARD_CONFIRM => Self::WizardConfirm,
            WIZARD_CANCEL => Self::WizardCancel,
            other => Self::Unrecognized(other.to_owned()),
        }
    }
}

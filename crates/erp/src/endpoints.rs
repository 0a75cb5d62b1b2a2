/// Relative endpoint paths on the ERP REST API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoints {
    pub login: String,
    pub item_list: String,
    pub debtor_list: String,
    pub invoice_list: String,
    pub invoice_create: String,
    pub debtor_create: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            login: "api/Login".to_owned(),
            item_list: "api/V2/Item/GetItem".to_owned(),
            debtor_list: "api/Debtor/GetDebtor/".to_owned(),
            invoice_list: "api/Invoice/GetInvoice".to_owned(),
            invoice_create: "api/Invoice".to_owned(),
            debtor_create: "api/Debtor/".to_owned(),
        }
    }
}

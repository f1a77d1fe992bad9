//! OFX/QFX statement parser.
//!
//! OFX 1.x is SGML: leaf elements carry a value and usually no closing tag.
//! OFX 2.x is XML. Both are read as tag soup with `quick-xml` into a small
//! element tree, which is then walked for bank, card and investment records
//! regardless of the issuing institution.

use chrono::NaiveDate;
use quick_xml::events::Event;
use quick_xml::Reader;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::debug;

use crate::error::{Error, Result};
use crate::normalize::{
    asset_class_hint, category_hint, decode_text, infer_transaction_type, normalize_description,
    normalize_symbol, parse_amount, raw_description,
};
use crate::options::ParseOptions;
use crate::registry::{contains_token, StatementParser};
use crate::types::{
    AccountBalance, AccountType, AssetClass, BankTransaction, FileFormat, Institution, InvestmentAction, InvestmentHolding,
    InvestmentTransaction, ParseResult, ResultBuilder, TransactionType,
};

/// Element of the OFX tree.
#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf { name: String, value: String },
    Aggregate(Aggregate),
}

/// An element with children. Names are upper-case.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Aggregate {
    name: String,
    children: Vec<Node>,
}

impl Aggregate {
    fn named(name: String) -> Self {
        Self {
            name,
            children: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value of a direct leaf child.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.children.iter().find_map(|child| match child {
            Node::Leaf { name: n, value } if n == name => Some(value.as_str()),
            _ => None,
        })
    }

    /// Non-empty value of a leaf anywhere below this element.
    pub fn find_value(&self, name: &str) -> Option<&str> {
        self.get(name).filter(|v| !v.is_empty()).or_else(|| {
            self.aggregates().find_map(|child| child.find_value(name))
        })
    }

    pub fn aggregates(&self) -> impl Iterator<Item = &Aggregate> {
        self.children.iter().filter_map(|child| match child {
            Node::Aggregate(aggregate) => Some(aggregate),
            Node::Leaf { .. } => None,
        })
    }

    /// Direct aggregate child.
    pub fn child(&self, name: &str) -> Option<&Aggregate> {
        self.aggregates().find(|child| child.name == name)
    }

    /// First aggregate with this name, depth first.
    pub fn find(&self, name: &str) -> Option<&Aggregate> {
        self.aggregates()
            .find_map(|child| if child.name == name { Some(child) } else { child.find(name) })
    }

    /// All aggregates with this name, depth first. Does not descend into
    /// matches.
    pub fn find_all<'a>(&'a self, name: &str) -> Vec<&'a Aggregate> {
        let mut out = Vec::new();
        self.collect(name, &mut out);
        out
    }

    fn collect<'a>(&'a self, name: &str, out: &mut Vec<&'a Aggregate>) {
        for child in self.aggregates() {
            if child.name == name {
                out.push(child);
            } else {
                child.collect(name, out);
            }
        }
    }
}

/// Locate the `<OFX>` body, case-insensitively.
fn body_start(text: &str) -> Option<usize> {
    text.to_ascii_lowercase().find("<ofx>")
}

/// Build the element tree of an OFX body with tag-soup rules:
/// text closes the element that was just opened (a leaf), a start tag with
/// the name of the innermost open aggregate closes it first, and an end tag
/// closes everything opened after its match. Unmatched end tags are ignored.
pub fn parse_tree(body: &str) -> Result<Aggregate> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);
    reader.config_mut().check_end_names = false;

    let mut stack: Vec<Aggregate> = vec![Aggregate::named(String::new())];
    let mut last_leaf: Option<String> = None;

    fn close_top(stack: &mut Vec<Aggregate>) {
        if stack.len() < 2 {
            return;
        }
        if let Some(top) = stack.pop() {
            let node = if top.children.is_empty() {
                Node::Leaf {
                    name: top.name,
                    value: String::new(),
                }
            } else {
                Node::Aggregate(top)
            };
            if let Some(parent) = stack.last_mut() {
                parent.children.push(node);
            }
        }
    }

    fn push_text(stack: &mut Vec<Aggregate>, value: String, last_leaf: &mut Option<String>) {
        let Some(top) = stack.last() else { return };
        if stack.len() < 2 || !top.children.is_empty() {
            return;
        }
        if let Some(top) = stack.pop() {
            *last_leaf = Some(top.name.clone());
            if let Some(parent) = stack.last_mut() {
                parent.children.push(Node::Leaf { name: top.name, value });
            }
        }
    }

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_uppercase();
                last_leaf = None;
                if stack.len() > 1 && stack.last().is_some_and(|top| top.name == name) {
                    close_top(&mut stack);
                }
                stack.push(Aggregate::named(name));
            }
            Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_uppercase();
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(Node::Leaf {
                        name,
                        value: String::new(),
                    });
                }
            }
            Ok(Event::Text(t)) => {
                let value = match t.unescape() {
                    Ok(text) => text.into_owned(),
                    Err(_) => String::from_utf8_lossy(&t).into_owned(),
                };
                push_text(&mut stack, value.trim().to_string(), &mut last_leaf);
            }
            Ok(Event::CData(c)) => {
                let value = String::from_utf8_lossy(&c).trim().to_string();
                push_text(&mut stack, value, &mut last_leaf);
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_uppercase();
                if last_leaf.take().as_deref() == Some(name.as_str()) {
                    continue;
                }
                if let Some(at) = stack.iter().skip(1).rposition(|open| open.name == name) {
                    while stack.len() > at + 1 {
                        close_top(&mut stack);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                if stack.len() > 1 || !stack[0].children.is_empty() {
                    debug!("OFX reader stopped early: {}", err);
                    break;
                }
                return Err(err.into());
            }
        }
    }

    while stack.len() > 1 {
        close_top(&mut stack);
    }
    Ok(stack.pop().unwrap_or_default())
}

/// Calendar date of an OFX timestamp `YYYYMMDD[HHMMSS[.XXX]][[+-]N:TZ]`.
pub fn parse_ofx_date(raw: &str) -> Result<NaiveDate> {
    let digits: String = raw.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.len() < 8 {
        return Err(Error::InvalidDate(raw.trim().to_string()));
    }
    NaiveDate::parse_from_str(&digits[..8], "%Y%m%d").map_err(|_| Error::InvalidDate(raw.trim().to_string()))
}

/// Amount in an OFX numeric field. Some servers write a decimal comma
/// (`-5,75`); a lone comma with no point is read as the decimal separator.
pub fn parse_ofx_amount(raw: &str) -> Result<Decimal> {
    let trimmed = raw.trim();
    if trimmed.matches(',').count() == 1 && !trimmed.contains('.') {
        return parse_amount(&trimmed.replace(',', "."));
    }
    parse_amount(trimmed)
}

/// Map an OFX bank `ACCTTYPE`.
pub fn account_type(code: &str) -> AccountType {
    match code.trim().to_uppercase().as_str() {
        "CHECKING" => AccountType::Checking,
        "SAVINGS" | "MONEYMRKT" | "CD" => AccountType::Savings,
        "CREDITLINE" => AccountType::Loan,
        _ => AccountType::Other,
    }
}

/// Map an OFX `TRNTYPE` code.
pub fn transaction_type(code: &str) -> Option<TransactionType> {
    let kind = match code.trim().to_uppercase().as_str() {
        "DEBIT" | "ATM" | "CASH" | "CHECK" | "DIRECTDEBIT" => TransactionType::Debit,
        "CREDIT" | "DEP" | "DIRECTDEP" | "DIV" => TransactionType::Credit,
        "INT" => TransactionType::Interest,
        "FEE" | "SRVCHG" => TransactionType::Fee,
        "POS" => TransactionType::Purchase,
        "PAYMENT" | "REPEATPMT" => TransactionType::Payment,
        "XFER" => TransactionType::Transfer,
        _ => return None,
    };
    Some(kind)
}

/// Issuer names recognized in `<FI><ORG>`.
const ORG_TOKENS: &[(&str, Institution)] = &[
    ("jpmorgan", Institution::Chase),
    ("chase", Institution::Chase),
    ("discover", Institution::Discover),
    ("american express", Institution::AmericanExpress),
    ("amex", Institution::AmericanExpress),
    ("capital one", Institution::CapitalOne),
    ("bank of america", Institution::BankOfAmerica),
    ("wells fargo", Institution::WellsFargo),
    ("citibank", Institution::Citibank),
    ("citi", Institution::Citibank),
    ("fidelity", Institution::Fidelity),
];

fn institution_from_org(org: &str) -> Institution {
    let lowered = org.to_lowercase();
    ORG_TOKENS
        .iter()
        .find(|(token, _)| contains_token(&lowered, token))
        .map(|(_, institution)| institution.clone())
        .unwrap_or_else(|| Institution::from_name(org))
}

#[derive(Debug, Clone)]
struct Security {
    ticker: Option<String>,
    name: String,
    asset_class: AssetClass,
}

/// Index `SECLIST` entries by `UNIQUEID`.
fn security_list(root: &Aggregate) -> HashMap<String, Security> {
    let mut securities = HashMap::new();
    let Some(list) = root.find("SECLIST") else {
        return securities;
    };
    for info in list.aggregates() {
        let asset_class = match info.name() {
            "STOCKINFO" => AssetClass::Equity,
            "MFINFO" => AssetClass::Fund,
            "DEBTINFO" => AssetClass::Bond,
            _ => AssetClass::Other,
        };
        if let Some(id) = info.find_value("UNIQUEID") {
            securities.insert(
                id.to_string(),
                Security {
                    ticker: info.find_value("TICKER").map(normalize_symbol),
                    name: info.find_value("SECNAME").unwrap_or("").to_string(),
                    asset_class,
                },
            );
        }
    }
    securities
}

/// OFX/QFX parser serving every institution.
#[derive(Debug, Clone)]
pub struct OfxParser {
    options: ParseOptions,
}

impl OfxParser {
    pub fn new(options: ParseOptions) -> Self {
        Self { options }
    }

    fn bank_transaction(
        &self,
        trn: &Aggregate,
        institution: &Institution,
        account: Option<&str>,
        currency: &str,
    ) -> Result<BankTransaction> {
        let posted = trn
            .get("DTPOSTED")
            .or_else(|| trn.get("DTUSER"))
            .ok_or_else(|| Error::MissingField("DTPOSTED".to_string()))?;
        let posted_date = parse_ofx_date(posted)?;
        let amount = parse_ofx_amount(trn.get("TRNAMT").ok_or_else(|| Error::MissingField("TRNAMT".to_string()))?)?;

        let memo = trn.get("MEMO").filter(|m| !m.is_empty());
        let raw = trn
            .get("NAME")
            .filter(|n| !n.is_empty())
            .or_else(|| trn.child("PAYEE").and_then(|p| p.get("NAME")))
            .or(memo)
            .unwrap_or("");

        let transaction_type = trn
            .get("TRNTYPE")
            .and_then(transaction_type)
            .unwrap_or_else(|| infer_transaction_type(amount, raw));

        Ok(BankTransaction {
            institution: institution.clone(),
            account: account.map(str::to_string),
            posted_date,
            raw_description: raw_description(raw),
            description: normalize_description(raw),
            amount,
            currency: trn
                .child("CURRENCY")
                .and_then(|c| c.get("CURSYM"))
                .unwrap_or(currency)
                .to_string(),
            transaction_type,
            balance: None,
            category: category_hint(raw),
            check_number: trn.get("CHECKNUM").filter(|c| !c.is_empty()).map(str::to_string),
            memo: memo.map(str::to_string),
            reference: trn.get("FITID").filter(|f| !f.is_empty()).map(str::to_string),
        })
    }

    fn holding(
        &self,
        position: &Aggregate,
        account: Option<&str>,
        securities: &HashMap<String, Security>,
    ) -> Result<InvestmentHolding> {
        let invpos = position.child("INVPOS").unwrap_or(position);
        let id = invpos
            .find_value("UNIQUEID")
            .ok_or_else(|| Error::MissingField("UNIQUEID".to_string()))?;
        let security = securities.get(id);

        let quantity = parse_ofx_amount(invpos.get("UNITS").ok_or_else(|| Error::MissingField("UNITS".to_string()))?)?;
        let price = parse_ofx_amount(invpos.get("UNITPRICE").ok_or_else(|| Error::MissingField("UNITPRICE".to_string()))?)?;
        let market_value = invpos.get("MKTVAL").map(parse_ofx_amount).transpose()?;

        let symbol = security
            .and_then(|s| s.ticker.clone())
            .unwrap_or_else(|| normalize_symbol(id));
        let description = security.map(|s| s.name.clone()).unwrap_or_default();
        let asset_class = match position.name() {
            "POSSTOCK" => AssetClass::Equity,
            "POSMF" => AssetClass::Fund,
            "POSDEBT" => AssetClass::Bond,
            _ => security
                .map(|s| s.asset_class)
                .filter(|class| *class != AssetClass::Other)
                .unwrap_or_else(|| asset_class_hint(&symbol, &description, None)),
        };

        Ok(InvestmentHolding {
            account: account.map(str::to_string),
            account_type: AccountType::Brokerage,
            symbol,
            description,
            quantity,
            cost_basis_per_unit: None,
            cost_basis_total: None,
            price,
            market_value,
            as_of: invpos.get("DTPRICEASOF").and_then(|d| parse_ofx_date(d).ok()),
            unrealized_gain: None,
            asset_class,
            value_mismatch: self.options.value_mismatch(quantity, price, market_value),
        })
    }

    fn investment_transaction(
        &self,
        entry: &Aggregate,
        account: Option<&str>,
        securities: &HashMap<String, Security>,
    ) -> Result<Option<InvestmentTransaction>> {
        let name = entry.name();
        let action = if name.starts_with("BUY") {
            InvestmentAction::Buy
        } else if name.starts_with("SELL") {
            InvestmentAction::Sell
        } else {
            match name {
                "INCOME" => InvestmentAction::Dividend,
                "REINVEST" => InvestmentAction::Reinvestment,
                "TRANSFER" => InvestmentAction::Transfer,
                "INVEXPENSE" => InvestmentAction::Fee,
                _ => return Ok(None),
            }
        };

        let trade = entry
            .find_value("DTTRADE")
            .ok_or_else(|| Error::MissingField("DTTRADE".to_string()))?;
        let trade_date = parse_ofx_date(trade)?;

        let id = entry.find_value("UNIQUEID").unwrap_or("");
        let security = securities.get(id);
        let symbol = security
            .and_then(|s| s.ticker.clone())
            .unwrap_or_else(|| normalize_symbol(id));
        let description = entry
            .find_value("MEMO")
            .map(str::to_string)
            .or_else(|| security.map(|s| s.name.clone()))
            .unwrap_or_else(|| name.to_string());

        let optional = |tag: &str| -> Result<Option<Decimal>> { entry.find_value(tag).map(parse_ofx_amount).transpose() };
        let commission = optional("COMMISSION")?.unwrap_or_default();
        let fees = optional("FEES")?.unwrap_or_default();

        Ok(Some(InvestmentTransaction {
            account: account.map(str::to_string),
            trade_date,
            symbol,
            description,
            action,
            quantity: optional("UNITS")?.unwrap_or_default(),
            price: optional("UNITPRICE")?.unwrap_or_default(),
            amount: optional("TOTAL")?.unwrap_or_default(),
            fees: commission + fees,
        }))
    }

    /// `LEDGERBAL` of a statement, with `AVAILBAL` when present.
    fn statement_balance(
        &self,
        statement: &Aggregate,
        account: Option<&str>,
        account_type: AccountType,
        currency: &str,
    ) -> Result<Option<AccountBalance>> {
        let Some(ledger) = statement.child("LEDGERBAL") else {
            return Ok(None);
        };
        let balance = parse_ofx_amount(ledger.get("BALAMT").ok_or_else(|| Error::MissingField("BALAMT".to_string()))?)?;
        let as_of = parse_ofx_date(ledger.get("DTASOF").ok_or_else(|| Error::MissingField("DTASOF".to_string()))?)?;
        let available_balance = statement
            .child("AVAILBAL")
            .and_then(|avail| avail.get("BALAMT"))
            .map(parse_ofx_amount)
            .transpose()?;
        Ok(Some(AccountBalance {
            account: account.map(str::to_string),
            account_type,
            as_of,
            balance,
            available_balance,
            currency: currency.to_string(),
        }))
    }

    /// Cash balance of an investment statement (`INVBAL/AVAILCASH`).
    fn cash_balance(&self, statement: &Aggregate, account: Option<&str>, currency: &str) -> Result<Option<AccountBalance>> {
        let Some(cash) = statement.child("INVBAL").and_then(|bal| bal.get("AVAILCASH")) else {
            return Ok(None);
        };
        let as_of = statement
            .get("DTASOF")
            .ok_or_else(|| Error::MissingField("DTASOF".to_string()))?;
        Ok(Some(AccountBalance {
            account: account.map(str::to_string),
            account_type: AccountType::Brokerage,
            as_of: parse_ofx_date(as_of)?,
            balance: parse_ofx_amount(cash)?,
            available_balance: None,
            currency: currency.to_string(),
        }))
    }

    fn walk_bank(&self, root: &Aggregate, builder: &mut ResultBuilder) {
        let mut statements = root.find_all("STMTRS");
        statements.extend(root.find_all("CCSTMTRS"));
        let institution = builder.institution().clone();

        if statements.is_empty() && root.find("INVSTMTRS").is_none() {
            for (n, trn) in root.find_all("STMTTRN").into_iter().enumerate() {
                match self.bank_transaction(trn, &institution, None, &self.options.default_currency) {
                    Ok(transaction) => builder.push_transaction(transaction),
                    Err(err) => builder.warn(None, format!("STMTTRN {}: {}", n + 1, err)),
                }
            }
            return;
        }

        for statement in statements {
            let currency = statement.get("CURDEF").unwrap_or(&self.options.default_currency).to_string();
            let (account, account_type) = match statement.child("BANKACCTFROM") {
                Some(from) => (
                    from.get("ACCTID"),
                    from.get("ACCTTYPE").map(account_type).unwrap_or(AccountType::Checking),
                ),
                None => (
                    statement.child("CCACCTFROM").and_then(|from| from.get("ACCTID")),
                    AccountType::CreditCard,
                ),
            };
            match self.statement_balance(statement, account, account_type, &currency) {
                Ok(Some(balance)) => builder.push_balance(balance),
                Ok(None) => {}
                Err(err) => builder.warn(None, format!("LEDGERBAL: {}", err)),
            }
            for (n, trn) in statement.find_all("STMTTRN").into_iter().enumerate() {
                match self.bank_transaction(trn, &institution, account, &currency) {
                    Ok(transaction) => builder.push_transaction(transaction),
                    Err(err) => builder.warn(None, format!("STMTTRN {}: {}", n + 1, err)),
                }
            }
        }
    }

    fn walk_investments(&self, root: &Aggregate, builder: &mut ResultBuilder) {
        let securities = security_list(root);
        let institution = builder.institution().clone();

        for statement in root.find_all("INVSTMTRS") {
            let currency = statement.get("CURDEF").unwrap_or(&self.options.default_currency).to_string();
            let account = statement.child("INVACCTFROM").and_then(|from| from.get("ACCTID"));
            match self.cash_balance(statement, account, &currency) {
                Ok(Some(balance)) => builder.push_balance(balance),
                Ok(None) => {}
                Err(err) => builder.warn(None, format!("INVBAL: {}", err)),
            }

            if let Some(positions) = statement.child("INVPOSLIST") {
                for position in positions.aggregates() {
                    match self.holding(position, account, &securities) {
                        Ok(holding) => {
                            if holding.value_mismatch {
                                builder.warn(
                                    None,
                                    format!(
                                        "{}: quantity x price = {} but market value is {}",
                                        holding.symbol,
                                        (holding.quantity * holding.price).round_dp(2),
                                        holding.market_value.unwrap_or_default()
                                    ),
                                );
                            }
                            builder.push_holding(holding);
                        }
                        Err(err) => builder.warn(None, format!("{}: {}", position.name(), err)),
                    }
                }
            }

            if let Some(transactions) = statement.child("INVTRANLIST") {
                for entry in transactions.aggregates() {
                    if entry.name() == "INVBANKTRAN" {
                        if let Some(trn) = entry.child("STMTTRN") {
                            match self.bank_transaction(trn, &institution, account, &currency) {
                                Ok(transaction) => builder.push_transaction(transaction),
                                Err(err) => builder.warn(None, format!("INVBANKTRAN: {}", err)),
                            }
                        }
                        continue;
                    }
                    match self.investment_transaction(entry, account, &securities) {
                        Ok(Some(transaction)) => builder.push_investment_transaction(transaction),
                        Ok(None) => {}
                        Err(err) => builder.warn(None, format!("{}: {}", entry.name(), err)),
                    }
                }
            }
        }
    }
}

impl StatementParser for OfxParser {
    fn parse(&self, bytes: &[u8], filename: Option<&str>) -> Result<ParseResult> {
        let text = decode_text(bytes)?;
        let start = body_start(&text).ok_or_else(|| Error::UnreadableInput("missing <OFX> body".to_string()))?;
        let root = parse_tree(&text[start..])?;

        let institution = root
            .find("FI")
            .and_then(|fi| fi.get("ORG"))
            .filter(|org| !org.trim().is_empty())
            .map(institution_from_org)
            .unwrap_or(Institution::Unknown);
        debug!(institution = %institution, file = filename.unwrap_or("-"), "OFX body located");

        let mut builder = ResultBuilder::new(institution, FileFormat::Ofx);
        self.walk_bank(&root, &mut builder);
        self.walk_investments(&root, &mut builder);

        if builder.record_count() == 0 {
            builder.warn(None, "no transactions recognized");
        }
        debug!("Parsed {} OFX records", builder.record_count());
        Ok(builder.finish())
    }

    fn institution(&self) -> Institution {
        Institution::Generic
    }

    fn format(&self) -> FileFormat {
        FileFormat::Ofx
    }
}

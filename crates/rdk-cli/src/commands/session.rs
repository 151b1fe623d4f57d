//! `rdk session`: drive a live desk from line commands.
//!
//! One command per line; blank lines and `#` comments are skipped.
//!
//! ```text
//! edit <currency> <rate>
//! cancel <currency>
//! price <order> <price>
//! currency <order> <currency>
//! add [<price> <currency> <title...>]
//! wait <ms>
//! show
//! ```
//!
//! `<order>` is a 1-based position or an order id. `show` and end of input
//! print the snapshot as one JSON line. A command the desk refuses prints an
//! `{"error": ..}` line and the session continues; a malformed line aborts it.

use std::io::Write;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use rdk_field::CurrencyKey;
use rdk_orders::{OrderDraft, OrderId};
use rdk_runtime::{DeskError, DeskHandle};
use serde_json::json;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info};

/// Order reference as typed on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderRef {
    /// 1-based position in insertion order.
    Position(usize),
    Id(OrderId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Edit { key: CurrencyKey, value: f64 },
    Cancel { key: CurrencyKey },
    Price { order: OrderRef, price: f64 },
    Currency { order: OrderRef, key: CurrencyKey },
    Add { draft: Option<OrderDraft> },
    Wait { ms: u64 },
    Show,
}

/// Parse one script line. `Ok(None)` for blank lines and comments.
pub fn parse_line(line: &str) -> Result<Option<SessionCommand>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut words = line.split_whitespace();
    let verb = words.next().unwrap_or_default();
    let args: Vec<&str> = words.collect();

    let cmd = match (verb, args.as_slice()) {
        ("edit", [key, value]) => SessionCommand::Edit {
            key: parse_currency(key)?,
            value: parse_number(value)?,
        },
        ("cancel", [key]) => SessionCommand::Cancel {
            key: parse_currency(key)?,
        },
        ("price", [order, price]) => SessionCommand::Price {
            order: parse_order_ref(order)?,
            price: parse_number(price)?,
        },
        ("currency", [order, key]) => SessionCommand::Currency {
            order: parse_order_ref(order)?,
            key: parse_currency(key)?,
        },
        ("add", []) => SessionCommand::Add { draft: None },
        ("add", [price, key, title @ ..]) if !title.is_empty() => SessionCommand::Add {
            draft: Some(OrderDraft::new(
                title.join(" "),
                parse_number(price)?,
                parse_currency(key)?,
            )),
        },
        ("wait", [ms]) => SessionCommand::Wait {
            ms: ms
                .parse()
                .with_context(|| format!("invalid wait '{ms}' (expected milliseconds)"))?,
        },
        ("show", []) => SessionCommand::Show,
        (
            "edit" | "cancel" | "price" | "currency" | "add" | "wait" | "show",
            _,
        ) => bail!("wrong arguments for '{verb}': {line}"),
        _ => bail!("unknown command '{verb}'"),
    };
    Ok(Some(cmd))
}

fn parse_currency(raw: &str) -> Result<CurrencyKey> {
    CurrencyKey::parse(raw).map_err(|e| anyhow!("{e}"))
}

fn parse_number(raw: &str) -> Result<f64> {
    raw.parse::<f64>()
        .with_context(|| format!("invalid number '{raw}'"))
}

fn parse_order_ref(raw: &str) -> Result<OrderRef> {
    if let Ok(position) = raw.parse::<usize>() {
        if position == 0 {
            bail!("order positions start at 1");
        }
        return Ok(OrderRef::Position(position));
    }
    raw.parse::<OrderId>()
        .map(OrderRef::Id)
        .map_err(|e| anyhow!("{e}"))
}

/// Read commands until EOF, executing each against `desk`.
pub async fn run_session<R, W>(desk: &DeskHandle, input: R, out: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    let mut line_no = 0usize;
    let mut executed = 0usize;

    while let Some(line) = lines.next_line().await.context("read session input")? {
        line_no += 1;
        let Some(cmd) = parse_line(&line).with_context(|| format!("line {line_no}"))? else {
            continue;
        };
        debug!(line = line_no, ?cmd, "session command");

        match execute(desk, cmd, out).await {
            Ok(()) => executed += 1,
            Err(SessionError::Desk(e)) => {
                writeln!(
                    out,
                    "{}",
                    json!({ "error": e.to_string(), "kind": e.kind().as_str(), "line": line_no })
                )?;
            }
            Err(SessionError::Fatal(e)) => return Err(e),
        }
    }

    print_snapshot(desk, out).await?;
    info!(lines = line_no, executed, "session finished");
    Ok(())
}

enum SessionError {
    /// The desk refused the command; reported and skipped.
    Desk(DeskError),
    Fatal(anyhow::Error),
}

impl From<DeskError> for SessionError {
    fn from(e: DeskError) -> Self {
        SessionError::Desk(e)
    }
}

impl From<anyhow::Error> for SessionError {
    fn from(e: anyhow::Error) -> Self {
        SessionError::Fatal(e)
    }
}

async fn execute<W: Write>(
    desk: &DeskHandle,
    cmd: SessionCommand,
    out: &mut W,
) -> Result<(), SessionError> {
    match cmd {
        SessionCommand::Edit { key, value } => {
            desk.edit_field(key, value).await?;
        }
        SessionCommand::Cancel { key } => {
            desk.cancel_field(key).await?;
        }
        SessionCommand::Price { order, price } => {
            let id = resolve_order(desk, order).await?;
            desk.edit_order_price(id, price).await?;
        }
        SessionCommand::Currency { order, key } => {
            let id = resolve_order(desk, order).await?;
            desk.edit_order_currency(id, key).await?;
        }
        SessionCommand::Add { draft } => {
            desk.add_order(draft).await?;
        }
        SessionCommand::Wait { ms } => {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        SessionCommand::Show => {
            print_snapshot(desk, out).await?;
        }
    }
    Ok(())
}

async fn resolve_order(desk: &DeskHandle, order: OrderRef) -> Result<OrderId, SessionError> {
    match order {
        OrderRef::Id(id) => Ok(id),
        OrderRef::Position(position) => {
            let snap = desk.snapshot().await?;
            snap.orders
                .get(position - 1)
                .map(|o| o.id)
                .ok_or_else(|| {
                    SessionError::Fatal(anyhow!(
                        "no order at position {position} ({} orders)",
                        snap.orders.len()
                    ))
                })
        }
    }
}

async fn print_snapshot<W: Write>(desk: &DeskHandle, out: &mut W) -> Result<()> {
    let snap = desk.snapshot().await.map_err(|e| anyhow!("{e}"))?;
    writeln!(out, "{}", serde_json::to_string(&snap)?)?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdk_config::load_desk_config_from_strings;
    use rdk_field::FixedOracle;
    use std::sync::Arc;

    fn key(s: &str) -> CurrencyKey {
        CurrencyKey::parse(s).unwrap()
    }

    #[test]
    fn parses_every_verb() {
        assert_eq!(
            parse_line("edit EUR 2.24").unwrap(),
            Some(SessionCommand::Edit {
                key: key("eur"),
                value: 2.24
            })
        );
        assert_eq!(
            parse_line("  cancel usd ").unwrap(),
            Some(SessionCommand::Cancel { key: key("usd") })
        );
        assert_eq!(
            parse_line("price 2 10").unwrap(),
            Some(SessionCommand::Price {
                order: OrderRef::Position(2),
                price: 10.0
            })
        );
        assert_eq!(
            parse_line("currency 1 rup").unwrap(),
            Some(SessionCommand::Currency {
                order: OrderRef::Position(1),
                key: key("rup")
            })
        );
        assert_eq!(
            parse_line("add").unwrap(),
            Some(SessionCommand::Add { draft: None })
        );
        assert_eq!(
            parse_line("wait 600").unwrap(),
            Some(SessionCommand::Wait { ms: 600 })
        );
        assert_eq!(parse_line("show").unwrap(), Some(SessionCommand::Show));
    }

    #[test]
    fn add_with_title_keeps_spaces() {
        let Some(SessionCommand::Add { draft: Some(draft) }) =
            parse_line("add 25 eur Blue Gym Bag").unwrap()
        else {
            panic!("expected add with draft");
        };
        assert_eq!(draft.title, "Blue Gym Bag");
        assert_eq!(draft.price, 25.0);
        assert_eq!(draft.currency, key("eur"));
    }

    #[test]
    fn order_ref_accepts_ids() {
        let id = OrderId::generate();
        assert_eq!(
            parse_line(&format!("price {id} 3")).unwrap(),
            Some(SessionCommand::Price {
                order: OrderRef::Id(id),
                price: 3.0
            })
        );
    }

    #[test]
    fn skips_blank_and_comment_lines() {
        assert_eq!(parse_line("").unwrap(), None);
        assert_eq!(parse_line("   ").unwrap(), None);
        assert_eq!(parse_line("# warm up").unwrap(), None);
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(parse_line("frobnicate").is_err());
        assert!(parse_line("edit eur").is_err());
        assert!(parse_line("edit eur abc").is_err());
        assert!(parse_line("edit e-ur 1").is_err());
        assert!(parse_line("price 0 1").is_err());
        assert!(parse_line("add 10 eur").is_err());
        assert!(parse_line("wait soon").is_err());
        assert!(parse_line("show now").is_err());
    }

    fn start(oracle: FixedOracle) -> DeskHandle {
        let loaded = load_desk_config_from_strings(&["desk:\n  debounce_ms: 100\n"]).unwrap();
        let (desk, _task) =
            rdk_runtime::spawn_desk_from_config(&loaded.desk, Arc::new(oracle)).unwrap();
        desk
    }

    fn json_lines(out: &[u8]) -> Vec<serde_json::Value> {
        String::from_utf8(out.to_vec())
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn script_edit_is_accepted_after_wait() {
        let desk = start(FixedOracle::approve_all());
        let script = b"edit eur 2.24\nshow\nwait 150\nshow\n";
        let mut out = Vec::new();
        run_session(&desk, &script[..], &mut out).await.unwrap();

        let lines = json_lines(&out);
        assert_eq!(lines.len(), 3, "two shows plus the final snapshot");
        let eur = |v: &serde_json::Value| v["fields"][0].clone();
        assert_eq!(eur(&lines[0])["status"], "DIRTY");
        assert_eq!(eur(&lines[1])["status"], "ACCEPTED");
        assert_eq!(eur(&lines[1])["accepted_value"], 2.24);
    }

    #[tokio::test(start_paused = true)]
    async fn refused_command_reports_and_continues() {
        let desk = start(FixedOracle::approve_all());
        let script = b"currency 1 gbp\nprice 1 -5\nadd\n";
        let mut out = Vec::new();
        run_session(&desk, &script[..], &mut out).await.unwrap();

        let lines = json_lines(&out);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["line"], 1);
        assert_eq!(lines[0]["kind"], "invalid");
        assert_eq!(lines[1]["line"], 2);
        assert_eq!(lines[2]["orders"].as_array().unwrap().len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_line_aborts_with_line_number() {
        let desk = start(FixedOracle::approve_all());
        let script = b"show\nbogus\n";
        let mut out = Vec::new();
        let err = run_session(&desk, &script[..], &mut out).await.unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));
    }
}

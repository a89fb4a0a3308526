use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use sea_orm::Database;

use engine::{
    AccountDetails, AccountFilter, AccountKind, Broker, ChildAccount, Currency,
    Engine, EngineError, Event, EventKind, EventSink, HistoryEdit, HistorySeed, NewAccountCmd,
    NewTransactionCmd, NotifyError, Subscriber, TransactionListFilter, UpdateAccountCmd,
};
use migration::MigratorTrait;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
}

#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<(EventKind, Option<i64>)>>,
}

#[async_trait::async_trait]
impl Subscriber for Recorder {
    async fn handle(&self, event: &Event) -> Result<(), NotifyError> {
        self.seen.lock().push((event.kind(), event.subject_id()));
        Ok(())
    }
}

async fn engine_with_broker() -> (Engine, Broker) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let broker = Broker::new();
    let engine = Engine::builder()
        .database(db)
        .events(Arc::new(broker.clone()))
        .build()
        .await
        .unwrap();
    (engine, broker)
}

async fn history_account_id(engine: &Engine, account_id: i64) -> i64 {
    let filter = AccountFilter {
        parent_id: Some(account_id),
        kinds: Some(vec![AccountKind::SystemHistoric]),
        include_archived: false,
    };
    let history = engine.accounts(&filter).await.unwrap();
    assert_eq!(history.len(), 1);
    history[0].id
}

#[tokio::test]
async fn builder_requires_an_event_sink() {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    let err = Engine::builder().database(db).build().await.unwrap_err();
    assert_eq!(err, EngineError::Notification(NotifyError::MissingSink));
}

#[tokio::test]
async fn capital_account_is_paired_with_history() {
    let (engine, _broker) = engine_with_broker().await;
    let cutover = now() - Duration::days(30);

    let account = engine
        .create_account(
            NewAccountCmd::new(AccountKind::CapitalNormal, " Checking ", Currency::Eur, now())
                .history(1000, cutover),
        )
        .await
        .unwrap();
    assert_eq!(account.name, "Checking");
    assert_eq!(account.capital, 0);

    let history_id = history_account_id(&engine, account.id).await;
    let history = engine.account(history_id).await.unwrap();
    assert_eq!(history.kind, AccountKind::SystemHistoric);
    assert_eq!(history.currency, Currency::Eur);
    assert_eq!(history.parent_id, Some(account.id));

    let (rows, next) = engine
        .list_transactions_for_account_page(
            account.id,
            10,
            None,
            &TransactionListFilter::default(),
            now(),
        )
        .await
        .unwrap();
    assert!(next.is_none());
    assert_eq!(rows.len(), 1);
    let (transfer, signed) = &rows[0];
    assert_eq!(transfer.source_id, history_id);
    assert_eq!(transfer.target_id, account.id);
    assert_eq!(*signed, 1000);

    let carried = engine.history(account.id, now()).await.unwrap().unwrap();
    assert_eq!(carried.balance, 1000);
    assert_eq!(carried.at, Some(cutover));

    // History accounts are hidden from regular listings.
    let top = engine.accounts(&AccountFilter::default()).await.unwrap();
    assert_eq!(top.iter().map(|a| a.id).collect::<Vec<_>>(), vec![account.id]);
}

#[tokio::test]
async fn negative_opening_balance_flows_to_history() {
    let (engine, _broker) = engine_with_broker().await;
    let cutover = now() - Duration::days(3);

    let loan = engine
        .create_account(
            NewAccountCmd::new(AccountKind::DebtLoan, "Mortgage", Currency::Eur, now())
                .capital(-150_000)
                .history(-2_500, cutover),
        )
        .await
        .unwrap();
    assert_eq!(loan.capital, -150_000);

    let carried = engine.history(loan.id, now()).await.unwrap().unwrap();
    assert_eq!(carried.balance, -2_500);
}

#[tokio::test]
async fn credit_card_debt_is_stored_positive() {
    let (engine, _broker) = engine_with_broker().await;

    let card = engine
        .create_account(
            NewAccountCmd::new(AccountKind::DebtCredit, "Card", Currency::Eur, now())
                .capital(-500),
        )
        .await
        .unwrap();
    assert_eq!(card.capital, 500);
    assert_eq!(engine.account(card.id).await.unwrap().capital, 500);

    let updated = engine
        .update_account(UpdateAccountCmd::debt(
            card.id,
            AccountKind::DebtCredit,
            AccountDetails::new("Card", Currency::Eur),
            -750,
            HistoryEdit::Keep,
            now(),
        ))
        .await
        .unwrap();
    assert_eq!(updated.capital, 750);
}

#[tokio::test]
async fn credit_capital_without_magnitude_is_rejected() {
    let (engine, _broker) = engine_with_broker().await;

    let err = engine
        .create_account(
            NewAccountCmd::new(AccountKind::DebtCredit, "Card", Currency::Eur, now())
                .capital(i64::MIN),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));
    assert!(
        engine
            .accounts(&AccountFilter::default())
            .await
            .unwrap()
            .is_empty()
    );

    let card = engine
        .create_account(
            NewAccountCmd::new(AccountKind::DebtCredit, "Card", Currency::Eur, now())
                .capital(-500),
        )
        .await
        .unwrap();
    let err = engine
        .update_account(UpdateAccountCmd::debt(
            card.id,
            AccountKind::DebtCredit,
            AccountDetails::new("Card", Currency::Eur),
            i64::MIN,
            HistoryEdit::Keep,
            now(),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));
    assert_eq!(engine.account(card.id).await.unwrap().capital, 500);
}

#[tokio::test]
async fn external_accounts_have_no_history_and_nest_once() {
    let (engine, _broker) = engine_with_broker().await;

    let expenses = engine
        .create_account(NewAccountCmd::new(
            AccountKind::ExternalExpense,
            "Expenses",
            Currency::Eur,
            now(),
        ))
        .await
        .unwrap();
    assert_eq!(engine.history(expenses.id, now()).await.unwrap(), None);

    let food = engine
        .create_account(
            NewAccountCmd::new(AccountKind::ExternalExpense, "Food", Currency::Eur, now())
                .parent(expenses.id),
        )
        .await
        .unwrap();
    assert_eq!(food.parent_id, Some(expenses.id));

    let err = engine
        .create_account(
            NewAccountCmd::new(AccountKind::ExternalExpense, "Snacks", Currency::Eur, now())
                .parent(food.id),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAccount(_)));

    let err = engine
        .create_account(
            NewAccountCmd::new(AccountKind::ExternalIncome, "Salary", Currency::Eur, now())
                .parent(expenses.id),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::KindMismatch(_)));

    let children = engine
        .accounts(&AccountFilter {
            parent_id: Some(expenses.id),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(children.len(), 1);
}

#[tokio::test]
async fn update_rejects_stale_kind_without_writing() {
    let (engine, broker) = engine_with_broker().await;
    let recorder = Arc::new(Recorder::default());
    broker.subscribe(EventKind::Updated, recorder.clone()).unwrap();

    let account = engine
        .create_account(NewAccountCmd::new(
            AccountKind::CapitalNormal,
            "Checking",
            Currency::Eur,
            now(),
        ))
        .await
        .unwrap();

    let err = engine
        .update_account(UpdateAccountCmd::capital(
            account.id,
            AccountKind::CapitalSavings,
            AccountDetails::new("Renamed", Currency::Eur),
            HistoryEdit::Keep,
            now(),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::KindMismatch(_)));
    assert!(err.is_invariant_violation());

    let err = engine
        .update_account(UpdateAccountCmd::external(
            account.id,
            AccountKind::CapitalNormal,
            AccountDetails::new("Renamed", Currency::Eur),
            vec![],
            now(),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UnsupportedKind(_)));

    broker.drain().await;
    assert!(recorder.seen.lock().is_empty());
    assert_eq!(engine.account(account.id).await.unwrap().name, "Checking");
}

#[tokio::test]
async fn capital_update_replaces_and_removes_history() {
    let (engine, _broker) = engine_with_broker().await;
    let cutover = now() - Duration::days(30);

    let account = engine
        .create_account(
            NewAccountCmd::new(AccountKind::CapitalSavings, "Savings", Currency::Eur, now())
                .history(1000, cutover),
        )
        .await
        .unwrap();

    let moved = now() - Duration::days(60);
    let updated = engine
        .update_account(UpdateAccountCmd::capital(
            account.id,
            AccountKind::CapitalSavings,
            AccountDetails::new("Rainy day", Currency::Eur).color("#0000ff"),
            HistoryEdit::Set(HistorySeed {
                balance: -400,
                at: moved,
            }),
            now(),
        ))
        .await
        .unwrap();
    assert_eq!(updated.name, "Rainy day");
    assert_eq!(updated.color, "#0000ff");

    let carried = engine.history(account.id, now()).await.unwrap().unwrap();
    assert_eq!(carried.balance, -400);
    assert_eq!(carried.at, Some(moved));

    let history_id = history_account_id(&engine, account.id).await;
    assert_eq!(
        engine.account(history_id).await.unwrap().name,
        "Rainy day (history)"
    );

    engine
        .update_account(UpdateAccountCmd::capital(
            account.id,
            AccountKind::CapitalSavings,
            AccountDetails::new("Rainy day", Currency::Eur),
            HistoryEdit::Remove,
            now(),
        ))
        .await
        .unwrap();
    let carried = engine.history(account.id, now()).await.unwrap().unwrap();
    assert_eq!(carried.balance, 0);
    assert_eq!(carried.at, None);
}

#[tokio::test]
async fn external_update_joins_children_by_id() {
    let (engine, _broker) = engine_with_broker().await;

    let income = engine
        .create_account(NewAccountCmd::new(
            AccountKind::ExternalIncome,
            "Income",
            Currency::Eur,
            now(),
        ))
        .await
        .unwrap();
    let salary = engine
        .create_account(
            NewAccountCmd::new(AccountKind::ExternalIncome, "Salary", Currency::Eur, now())
                .parent(income.id),
        )
        .await
        .unwrap();
    let bonus = engine
        .create_account(
            NewAccountCmd::new(AccountKind::ExternalIncome, "Bonus", Currency::Eur, now())
                .parent(income.id),
        )
        .await
        .unwrap();

    let later = now() + Duration::hours(1);
    engine
        .update_account(UpdateAccountCmd::external(
            income.id,
            AccountKind::ExternalIncome,
            AccountDetails::new("Income", Currency::Usd),
            // Submitted out of order and without `bonus`.
            vec![
                ChildAccount::new("Dividends"),
                ChildAccount::existing(salary.id, "Wages"),
            ],
            later,
        ))
        .await
        .unwrap();

    let children = engine
        .accounts(&AccountFilter {
            parent_id: Some(income.id),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(children.len(), 3);

    let wages = children.iter().find(|c| c.id == salary.id).unwrap();
    assert_eq!(wages.name, "Wages");
    assert_eq!(wages.created_at, salary.created_at);
    assert_eq!(wages.updated_at, later);
    assert_eq!(wages.currency, Currency::Usd);

    let untouched = children.iter().find(|c| c.id == bonus.id).unwrap();
    assert_eq!(untouched.name, "Bonus");
    assert_eq!(untouched.updated_at, bonus.updated_at);

    let dividends = children.iter().find(|c| c.name == "Dividends").unwrap();
    assert_eq!(dividends.kind, AccountKind::ExternalIncome);
    assert_eq!(dividends.created_at, later);
}

#[tokio::test]
async fn external_update_with_foreign_child_rolls_back() {
    let (engine, _broker) = engine_with_broker().await;

    let income = engine
        .create_account(NewAccountCmd::new(
            AccountKind::ExternalIncome,
            "Income",
            Currency::Eur,
            now(),
        ))
        .await
        .unwrap();
    let expenses = engine
        .create_account(NewAccountCmd::new(
            AccountKind::ExternalExpense,
            "Expenses",
            Currency::Eur,
            now(),
        ))
        .await
        .unwrap();

    let err = engine
        .update_account(UpdateAccountCmd::external(
            income.id,
            AccountKind::ExternalIncome,
            AccountDetails::new("Renamed", Currency::Eur),
            vec![
                ChildAccount::new("Gifts"),
                ChildAccount::existing(expenses.id, "Hijacked"),
            ],
            now(),
        ))
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    assert_eq!(engine.account(income.id).await.unwrap().name, "Income");
    assert_eq!(engine.account(expenses.id).await.unwrap().name, "Expenses");
    let children = engine
        .accounts(&AccountFilter {
            parent_id: Some(income.id),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(children.is_empty());
}

#[tokio::test]
async fn delete_cascades_to_children_and_their_transactions() {
    let (engine, _broker) = engine_with_broker().await;
    let eur = Currency::Eur;

    let parent = engine
        .create_account(NewAccountCmd::new(AccountKind::ExternalExpense, "Home", eur, now()))
        .await
        .unwrap();
    let rent = engine
        .create_account(
            NewAccountCmd::new(AccountKind::ExternalExpense, "Rent", eur, now()).parent(parent.id),
        )
        .await
        .unwrap();
    let power = engine
        .create_account(
            NewAccountCmd::new(AccountKind::ExternalExpense, "Power", eur, now()).parent(parent.id),
        )
        .await
        .unwrap();
    let bank = engine
        .create_account(NewAccountCmd::new(AccountKind::CapitalNormal, "Bank", eur, now()))
        .await
        .unwrap();
    let cash = engine
        .create_account(NewAccountCmd::new(AccountKind::CapitalNormal, "Cash", eur, now()))
        .await
        .unwrap();

    let t1 = engine
        .create_transaction(NewTransactionCmd::new(bank.id, parent.id, 10, now()))
        .await
        .unwrap();
    let t2 = engine
        .create_transaction(NewTransactionCmd::new(bank.id, rent.id, 20, now()))
        .await
        .unwrap();
    let t3 = engine
        .create_transaction(NewTransactionCmd::new(power.id, cash.id, 30, now()))
        .await
        .unwrap();
    let t4 = engine
        .create_transaction(NewTransactionCmd::new(bank.id, cash.id, 40, now()))
        .await
        .unwrap();

    let later = now() + Duration::minutes(5);
    engine.delete_account(parent.id, later).await.unwrap();

    for id in [parent.id, rent.id, power.id] {
        assert!(engine.account(id).await.unwrap_err().is_not_found());
    }
    for tx in [&t1, &t2, &t3] {
        assert!(engine.transaction(tx.id).await.unwrap_err().is_not_found());
    }
    assert_eq!(engine.transaction(t4.id).await.unwrap(), t4);
    assert_eq!(engine.balance(bank.id, later).await.unwrap(), -40);
    assert_eq!(engine.balance(cash.id, later).await.unwrap(), 40);

    let filter = TransactionListFilter {
        include_deleted: true,
        ..Default::default()
    };
    let (rows, _) = engine
        .list_transactions_for_account_page(bank.id, 10, None, &filter, later)
        .await
        .unwrap();
    let deleted: Vec<_> = rows
        .iter()
        .filter(|(tx, _)| tx.deleted_at == Some(later))
        .map(|(tx, _)| tx.id)
        .collect();
    assert_eq!(deleted.len(), 2);
    assert!(deleted.contains(&t1.id) && deleted.contains(&t2.id));
}

#[tokio::test]
async fn delete_removes_history_with_the_account() {
    let (engine, _broker) = engine_with_broker().await;

    let account = engine
        .create_account(
            NewAccountCmd::new(AccountKind::CapitalNormal, "Old", Currency::Eur, now())
                .history(300, now() - Duration::days(1)),
        )
        .await
        .unwrap();
    let history_id = history_account_id(&engine, account.id).await;

    let err = engine.delete_account(history_id, now()).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidAccount(_)));

    engine.delete_account(account.id, now()).await.unwrap();
    assert!(engine.account(history_id).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn delete_is_idempotent_but_absent_is_not_found() {
    let (engine, broker) = engine_with_broker().await;
    let recorder = Arc::new(Recorder::default());
    broker.subscribe(EventKind::Deleted, recorder.clone()).unwrap();

    let account = engine
        .create_account(NewAccountCmd::new(
            AccountKind::CapitalNormal,
            "Temp",
            Currency::Eur,
            now(),
        ))
        .await
        .unwrap();

    engine.delete_account(account.id, now()).await.unwrap();
    engine.delete_account(account.id, now()).await.unwrap();
    assert!(engine.delete_account(9_999, now()).await.unwrap_err().is_not_found());

    broker.drain().await;
    assert_eq!(
        *recorder.seen.lock(),
        vec![(EventKind::Deleted, Some(account.id))]
    );
}

#[tokio::test]
async fn lifecycle_publishes_one_event_per_command() {
    let (engine, broker) = engine_with_broker().await;
    let recorder = Arc::new(Recorder::default());
    for kind in [EventKind::Created, EventKind::Updated, EventKind::Deleted] {
        broker.subscribe(kind, recorder.clone()).unwrap();
    }

    let account = engine
        .create_account(NewAccountCmd::new(
            AccountKind::CapitalNormal,
            "Checking",
            Currency::Eur,
            now(),
        ))
        .await
        .unwrap();
    engine
        .set_account_archived(account.id, true, now())
        .await
        .unwrap();
    engine.delete_account(account.id, now()).await.unwrap();
    broker.drain().await;

    let mut seen = recorder.seen.lock().clone();
    seen.sort_by_key(|(kind, _)| kind.as_str());
    assert_eq!(
        seen,
        vec![
            (EventKind::Created, Some(account.id)),
            (EventKind::Deleted, Some(account.id)),
            (EventKind::Updated, Some(account.id)),
        ]
    );
}

#[tokio::test]
async fn archived_accounts_are_listed_on_request() {
    let (engine, _broker) = engine_with_broker().await;

    let account = engine
        .create_account(NewAccountCmd::new(
            AccountKind::CapitalNormal,
            "Old bank",
            Currency::Eur,
            now(),
        ))
        .await
        .unwrap();
    let archived = engine
        .set_account_archived(account.id, true, now())
        .await
        .unwrap();
    assert_eq!(archived.archived_at, Some(now()));

    assert!(engine.accounts(&AccountFilter::default()).await.unwrap().is_empty());
    let all = engine
        .accounts(&AccountFilter {
            include_archived: true,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(all.len(), 1);

    let restored = engine
        .set_account_archived(account.id, false, now())
        .await
        .unwrap();
    assert!(!restored.is_archived());
}

#[tokio::test]
async fn failed_notification_keeps_the_commit() {
    let (engine, broker) = engine_with_broker().await;
    broker.shutdown().await;

    let err = engine
        .create_account(NewAccountCmd::new(
            AccountKind::CapitalNormal,
            "Checking",
            Currency::Eur,
            now(),
        ))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::Notification(NotifyError::Closed));
    assert!(err.is_committed());
    assert_eq!(err.public_message(), "internal error");

    let accounts = engine.accounts(&AccountFilter::default()).await.unwrap();
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].name, "Checking");
}

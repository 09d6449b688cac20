//! Routes parsed EPP documents to the object handlers
//!
//! One store transaction is checked out per command and held until the
//! handler finishes; it commits when the result code is a success code and
//! rolls back otherwise, so no failed command leaves partial writes behind.

use tracing::{debug, error, warn};

use crate::config::Policy;
use crate::domain::transfer::TransferOp;
use crate::error::Error;
use crate::request::{
    CheckPayload, Command, CreatePayload, DeletePayload, EppMessage, InfoPayload, RenewPayload,
    TransferPayload, UpdatePayload, Verb,
};
use crate::response::{Reply, ResultCode, TrIds};
use crate::session::Session;
use crate::store::{Store, Txn};
use crate::{contact, domain, greeting, host, xml};

/// Everything a handler may need besides its parsed request: the
/// authenticated client, the transaction identifiers for the response, and
/// the policy knobs that show up in responses.
pub(crate) struct CommandContext<'a> {
    pub client: &'a str,
    pub tr_ids: TrIds,
    pub server_id: &'a str,
    pub transfer_window_days: i64,
}

/// The serialized response for one inbound frame, and whether the session
/// ends after it is written.
pub(crate) struct Processed {
    pub xml: String,
    pub close: bool,
}

pub(crate) async fn process(
    payload: &str,
    session: &mut Session,
    store: &Store,
    policy: &Policy,
) -> Result<Processed, Error> {
    let message = match xml::deserialize::<EppMessage>(payload) {
        Ok(message) => message,
        Err(err) => {
            debug!(session = %session.id(), error = %err, "unparseable frame");
            let reply = Reply::new(ResultCode::CommandSyntaxError, &TrIds::new(None))?;
            return Ok(Processed {
                xml: reply.xml,
                close: false,
            });
        }
    };

    match message {
        EppMessage::Hello(_) => Ok(Processed {
            xml: greeting::greeting(&policy.server_id)?,
            close: false,
        }),
        EppMessage::Extension(_) => {
            let reply = Reply::new(ResultCode::UnknownCommand, &TrIds::new(None))?;
            Ok(Processed {
                xml: reply.xml,
                close: false,
            })
        }
        EppMessage::Command(command) => {
            let tr_ids = TrIds::new(command.client_tr_id.clone());
            let (reply, close) = run(&command, tr_ids, session, store, policy).await?;
            Ok(Processed {
                xml: reply.xml,
                close,
            })
        }
    }
}

async fn run(
    command: &Command,
    tr_ids: TrIds,
    session: &mut Session,
    store: &Store,
    policy: &Policy,
) -> Result<(Reply, bool), Error> {
    match &command.verb {
        Verb::Login(login) => {
            let mut txn = store.begin().await?;
            let reply = session.login(login, &mut txn, &tr_ids).await?;
            finish(txn, &reply).await;
            Ok((reply, false))
        }
        Verb::Logout(_) => Ok((session.logout(&tr_ids)?, true)),
        verb => {
            let Some(client) = session.client_id() else {
                // Everything but hello and login requires authentication.
                return Ok((Reply::new(ResultCode::CommandUseError, &tr_ids)?, false));
            };

            let ctx = CommandContext {
                client,
                tr_ids,
                server_id: &policy.server_id,
                transfer_window_days: policy.transfer_window_days,
            };
            let mut txn = store.begin().await?;
            let reply = match route(verb, &ctx, &mut txn).await {
                Ok(reply) => {
                    finish(txn, &reply).await;
                    reply
                }
                Err(err) => {
                    // Internal failure: roll back and answer 2400 without
                    // disclosing detail.
                    error!(session = %session.id(), error = %err, "command failed");
                    if let Err(err) = txn.rollback().await {
                        warn!(error = %err, "rollback failed");
                    }
                    Reply::new(ResultCode::CommandFailed, &ctx.tr_ids)?
                }
            };
            Ok((reply, false))
        }
    }
}

async fn finish(txn: Txn, reply: &Reply) {
    let result = if reply.code.is_success() {
        txn.commit().await
    } else {
        txn.rollback().await
    };
    if let Err(err) = result {
        warn!(error = %err, "transaction completion failed");
    }
}

async fn route(
    verb: &Verb,
    ctx: &CommandContext<'_>,
    txn: &mut Txn,
) -> Result<Reply, Error> {
    match verb {
        Verb::Check(check) => match &check.payload {
            Some(CheckPayload::Domain(request)) => domain::check::handle(request, ctx, txn).await,
            Some(CheckPayload::Contact(request)) => contact::check::handle(request, ctx, txn).await,
            Some(CheckPayload::Host(request)) => host::check::handle(request, ctx, txn).await,
            Some(CheckPayload::Unknown(_)) | None => unimplemented_object(ctx),
        },
        Verb::Info(info) => match &info.payload {
            Some(InfoPayload::Domain(request)) => domain::info::handle(request, ctx, txn).await,
            Some(InfoPayload::Contact(request)) => contact::info::handle(request, ctx, txn).await,
            Some(InfoPayload::Host(request)) => host::info::handle(request, ctx, txn).await,
            Some(InfoPayload::Unknown(_)) | None => unimplemented_object(ctx),
        },
        Verb::Create(create) => match &create.payload {
            Some(CreatePayload::Domain(request)) => domain::create::handle(request, ctx, txn).await,
            Some(CreatePayload::Contact(request)) => {
                contact::create::handle(request, ctx, txn).await
            }
            Some(CreatePayload::Host(request)) => host::create::handle(request, ctx, txn).await,
            Some(CreatePayload::Unknown(_)) | None => unimplemented_object(ctx),
        },
        Verb::Update(update) => match &update.payload {
            Some(UpdatePayload::Domain(request)) => domain::update::handle(request, ctx, txn).await,
            Some(UpdatePayload::Contact(request)) => {
                contact::update::handle(request, ctx, txn).await
            }
            Some(UpdatePayload::Host(request)) => host::update::handle(request, ctx, txn).await,
            Some(UpdatePayload::Unknown(_)) | None => unimplemented_object(ctx),
        },
        Verb::Delete(delete) => match &delete.payload {
            Some(DeletePayload::Domain(request)) => domain::delete::handle(request, ctx, txn).await,
            Some(DeletePayload::Contact(request)) => {
                contact::delete::handle(request, ctx, txn).await
            }
            Some(DeletePayload::Host(request)) => host::delete::handle(request, ctx, txn).await,
            Some(DeletePayload::Unknown(_)) | None => unimplemented_object(ctx),
        },
        Verb::Renew(renew) => match &renew.payload {
            Some(RenewPayload::Domain(request)) => domain::renew::handle(request, ctx, txn).await,
            Some(RenewPayload::Unknown(_)) | None => unimplemented_object(ctx),
        },
        Verb::Transfer(transfer) => {
            let Some(op) = TransferOp::from_attr(transfer.op.as_deref()) else {
                return Reply::new(ResultCode::UnimplementedOption, &ctx.tr_ids);
            };
            match &transfer.payload {
                Some(TransferPayload::Domain(request)) => {
                    domain::transfer::handle(op, request, ctx, txn).await
                }
                Some(TransferPayload::Unknown(_)) | None => unimplemented_object(ctx),
            }
        }
        Verb::Poll(_) => Reply::new(ResultCode::UnimplementedCommand, &ctx.tr_ids),
        Verb::Unknown(_) => Reply::new(ResultCode::UnknownCommand, &ctx.tr_ids),
        Verb::Login(_) | Verb::Logout(_) => Reply::new(ResultCode::CommandUseError, &ctx.tr_ids),
    }
}

fn unimplemented_object(ctx: &CommandContext<'_>) -> Result<Reply, Error> {
    Reply::with_message(
        ResultCode::UnimplementedCommand,
        "Unimplemented object type",
        &ctx.tr_ids,
    )
}

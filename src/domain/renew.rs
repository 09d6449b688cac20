//! Types for EPP domain renew

use chrono::{Days, NaiveDate, Utc};
use instant_xml::{FromXml, ToXml};

use super::{Period, XMLNS};
use crate::dispatch::CommandContext;
use crate::error::Error;
use crate::response::{Reply, ResultCode};
use crate::store::Txn;
use crate::xml::format_time;

// Request

#[derive(Debug, FromXml)]
#[xml(rename = "renew", ns(XMLNS))]
pub struct DomainRenew {
    pub name: Option<String>,
    /// The expiration date the client believes is current, `YYYY-MM-DD`
    #[xml(rename = "curExpDate")]
    pub current_expiry: Option<String>,
    pub period: Option<Period>,
}

// Response

/// The `<renData>` tag for domain renew responses
#[derive(Debug, ToXml)]
#[xml(rename = "renData", ns(XMLNS))]
pub struct RenewData {
    pub name: String,
    #[xml(rename = "exDate")]
    pub expires_at: String,
}

/// `curExpDate` is the optimistic-concurrency token: it must match the
/// stored expiration to the day or the renewal is refused with 2306.
pub(crate) async fn handle(
    request: &DomainRenew,
    ctx: &CommandContext<'_>,
    txn: &mut Txn,
) -> Result<Reply, Error> {
    let (Some(name), Some(current_expiry)) = (&request.name, &request.current_expiry) else {
        return Reply::new(ResultCode::RequiredParameterMissing, &ctx.tr_ids);
    };
    let name = name.trim().to_lowercase();

    let years = match &request.period {
        Some(period) => match period.years() {
            Some(years) => years,
            None => return Reply::new(ResultCode::ParameterValueSyntaxError, &ctx.tr_ids),
        },
        None => 1,
    };

    let Ok(current_expiry) = NaiveDate::parse_from_str(current_expiry.trim(), "%Y-%m-%d") else {
        return Reply::new(ResultCode::ParameterValueSyntaxError, &ctx.tr_ids);
    };

    let Some(mut domain) = txn.domain(&name).await? else {
        return Reply::new(ResultCode::ObjectDoesNotExist, &ctx.tr_ids);
    };
    if domain.client_id != ctx.client {
        return Reply::new(ResultCode::AuthorizationError, &ctx.tr_ids);
    }
    if domain.expires_at.date_naive() != current_expiry {
        return Reply::new(ResultCode::ParameterValuePolicyError, &ctx.tr_ids);
    }

    domain.expires_at = domain.expires_at + Days::new(365 * u64::from(years));
    domain.updated_at = Some(Utc::now());
    txn.update_domain(&domain).await?;

    tracing::info!(domain = %name, client = %ctx.client, years, "domain renewed");
    Reply::with_data(
        ResultCode::CommandCompletedSuccessfully,
        RenewData {
            name,
            expires_at: format_time(domain.expires_at),
        },
        &ctx.tr_ids,
    )
}

//! Per object-type backup steps.

use super::{tables, StepContext, StepReport};
use crate::config::ObjectType;
use crate::error::{BackupError, Result};
use crate::reconcile::{remove_extraneous, ReconcileReport};
use crate::source::DbObject;
use crate::transfer::{should_export, ExportJob};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub(crate) async fn run_step(
    ctx: &StepContext,
    kind: ObjectType,
    cancel: &CancellationToken,
    report: &mut StepReport,
) -> Result<()> {
    match kind {
        ObjectType::Parameters => parameters(ctx, report).await,
        ObjectType::ConsumerGroups => consumer_groups(ctx, report).await,
        ObjectType::Schemas => schemas(ctx, report).await,
        ObjectType::Tables => tables::backup_tables(ctx, cancel, report).await,
        ObjectType::Views => views(ctx, cancel, report).await,
        ObjectType::Scripts => scripts(ctx, report).await,
        ObjectType::Functions => functions(ctx, report).await,
        ObjectType::Connections => connections(ctx, report).await,
        ObjectType::Roles => roles(ctx, report).await,
        ObjectType::Users => users(ctx, report).await,
        ObjectType::All => Err(BackupError::Config(
            "'all' must be expanded before running steps".into(),
        )),
    }
}

/// Prune extraneous artifacts when drop-extras is on.
pub(crate) async fn reconcile<T: DbObject>(
    ctx: &StepContext,
    kind: ObjectType,
    live: &[T],
) -> Result<ReconcileReport> {
    if !ctx.config.backup.drop_extras {
        return Ok(ReconcileReport::default());
    }
    remove_extraneous(kind, live, ctx.writer.root(), &ctx.criteria).await
}

async fn parameters(ctx: &StepContext, report: &mut StepReport) -> Result<()> {
    let params = ctx.catalog.parameters().await?;
    ctx.writer.write_parameters(&params).await?;
    report.objects_written = params.len();
    Ok(())
}

async fn consumer_groups(ctx: &StepContext, report: &mut StepReport) -> Result<()> {
    if ctx.catalog.capabilities().consumer_groups() {
        let groups = ctx.catalog.consumer_groups().await?;
        ctx.writer.write_consumer_groups(&groups).await?;
        report.objects_written = groups.len();
    } else {
        let groups = ctx.catalog.priority_groups().await?;
        ctx.writer.write_priority_groups(&groups).await?;
        report.objects_written = groups.len();
    }
    Ok(())
}

async fn schemas(ctx: &StepContext, report: &mut StepReport) -> Result<()> {
    let schemas = ctx.catalog.schemas().await?;
    report.files_removed += reconcile(ctx, ObjectType::Schemas, &schemas).await?.len();
    for schema in &schemas {
        ctx.writer.write_schema(schema).await?;
    }
    report.objects_written = schemas.len();
    Ok(())
}

/// Views run one at a time: DDL, then `COUNT(*)`, then the export.
///
/// A failed export leaves the view's DDL in place and moves on to the next
/// view; the step fails at the end with every export error collected.
async fn views(ctx: &StepContext, cancel: &CancellationToken, report: &mut StepReport) -> Result<()> {
    let views = ctx.catalog.views().await?;
    report.files_removed += reconcile(ctx, ObjectType::Views, &views).await?.len();

    let max_rows = ctx.config.backup.max_view_rows;
    let mut errors = Vec::new();
    for view in &views {
        if cancel.is_cancelled() {
            return Err(BackupError::Cancelled);
        }
        ctx.writer.write_view(view).await?;
        report.objects_written += 1;

        let row_count = if max_rows > 0 {
            ctx.catalog.view_row_count(view).await?
        } else {
            0
        };
        if !should_export(row_count, max_rows) {
            debug!("{}: not exporting data ({} rows)", view.full_name(), row_count);
            if ctx.config.backup.drop_extras
                && ctx
                    .writer
                    .remove_data(&view.schema, ObjectType::Views, &view.name)
                    .await?
                    .is_some()
            {
                report.files_removed += 1;
            }
            continue;
        }

        let path = ctx.writer.data_path(&view.schema, ObjectType::Views, &view.name);
        let job = ExportJob::for_view(view, row_count, path);
        match ctx.pipeline.run(&job, cancel).await {
            Ok(stats) => {
                report.data_files_written += 1;
                report.bytes_exported += stats.bytes;
            }
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => errors.push(e),
        }
    }
    BackupError::collect(errors)
}

async fn scripts(ctx: &StepContext, report: &mut StepReport) -> Result<()> {
    let scripts = ctx.catalog.scripts().await?;
    report.files_removed += reconcile(ctx, ObjectType::Scripts, &scripts).await?.len();
    for script in &scripts {
        ctx.writer.write_script(script).await?;
    }
    report.objects_written = scripts.len();
    Ok(())
}

async fn functions(ctx: &StepContext, report: &mut StepReport) -> Result<()> {
    let functions = ctx.catalog.functions().await?;
    report.files_removed += reconcile(ctx, ObjectType::Functions, &functions)
        .await?
        .len();
    for function in &functions {
        ctx.writer.write_function(function).await?;
    }
    report.objects_written = functions.len();
    Ok(())
}

async fn connections(ctx: &StepContext, report: &mut StepReport) -> Result<()> {
    let connections = ctx.catalog.connections().await?;
    ctx.writer.write_connections(&connections).await?;
    report.objects_written = connections.len();
    Ok(())
}

async fn roles(ctx: &StepContext, report: &mut StepReport) -> Result<()> {
    let roles = ctx.catalog.roles().await?;
    if ctx.config.backup.drop_extras {
        report.files_removed += ctx.writer.clear_principal_dir(ObjectType::Roles).await?.len();
    }
    let caps = ctx.catalog.capabilities();
    for role in &roles {
        ctx.writer.write_role(role, caps).await?;
    }

    let names: Vec<String> = roles.iter().map(|r| r.name.clone()).collect();
    let privileges = ctx.catalog.privileges(&names).await?;
    ctx.writer
        .append_privileges(ObjectType::Roles, &privileges)
        .await?;
    info!("{} roles, {} privileges", roles.len(), privileges.len());
    report.objects_written = roles.len();
    Ok(())
}

async fn users(ctx: &StepContext, report: &mut StepReport) -> Result<()> {
    let users = ctx.catalog.users().await?;
    if ctx.config.backup.drop_extras {
        report.files_removed += ctx.writer.clear_principal_dir(ObjectType::Users).await?.len();
    }
    let caps = ctx.catalog.capabilities();
    for user in &users {
        ctx.writer.write_user(user, caps).await?;
    }

    let names: Vec<String> = users.iter().map(|u| u.name.clone()).collect();
    let privileges = ctx.catalog.privileges(&names).await?;
    ctx.writer
        .append_privileges(ObjectType::Users, &privileges)
        .await?;
    info!("{} users, {} privileges", users.len(), privileges.len());
    report.objects_written = users.len();
    Ok(())
}

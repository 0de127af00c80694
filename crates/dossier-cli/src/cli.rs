//! Command handlers.
//!
//! Every handler builds a markdown document from the core Display
//! implementations and hands it to the [`TerminalRenderer`].

use std::fmt::Write as _;

use anyhow::{Context as _, Result};
use dossier_core::{Connect, Context, DbMeta, DossierError, EditorParams, Period};
use log::debug;

use crate::{
    args::{
        ArchiveArgs, BackupArgs, CreateArgs, DefineArgs, PeriodCommands, QueryArgs, RestoreArgs,
    },
    renderer::{LiveOutput, TerminalRenderer},
};

pub struct Cli {
    context: Context,
    renderer: TerminalRenderer,
}

impl Cli {
    pub fn new(context: Context, renderer: TerminalRenderer) -> Self {
        Self { context, renderer }
    }

    pub fn list_providers(&self) -> Result<()> {
        let mut out = String::from("# Providers\n\n");
        for name in self.context.registry().list() {
            let provider = self.context.registry().resolve(name)?;
            let mut capabilities = vec!["queries"];
            if provider.admin().is_some() {
                capabilities.push("administration");
            }
            if provider.lifecycle().is_some() {
                capabilities.push("backup, restore and archive");
            }
            writeln!(out, "- **{name}**: {}", capabilities.join(", "))?;
        }
        self.renderer.render(&out)
    }

    pub fn list_dossiers(&self) -> Result<()> {
        let dossiers = self.context.directory().load_all();
        if dossiers.is_empty() {
            return self.renderer.render("No dossier recorded.\n");
        }

        let mut out = String::from("# Dossiers\n\n");
        for meta in &dossiers {
            let current = meta
                .current_period()
                .map_or_else(|| "no current period".to_string(), ToString::to_string);
            writeln!(
                out,
                "- **{}** ({}): {current}",
                meta.dossier_name(),
                meta.provider_name()
            )?;
        }
        self.renderer.render(&out)
    }

    pub fn show_dossier(&self, dossier: &str) -> Result<()> {
        let meta = self.load(dossier)?;
        self.renderer.render(&meta.to_string())
    }

    pub fn define_dossier(&self, args: DefineArgs) -> Result<()> {
        let name = args.dossier.clone();
        let editor = EditorParams::from(args);
        let meta = self
            .context
            .directory()
            .define(&name, &editor)
            .with_context(|| format!("Failed to define dossier '{name}'"))?;
        self.renderer
            .render(&format!("Dossier **{name}** defined.\n\n{meta}"))
    }

    pub fn remove_dossier(&self, dossier: &str) -> Result<()> {
        let directory = self.context.directory();
        let meta = self.load(dossier)?;
        directory.remove(meta)?;
        self.renderer
            .render(&format!("Dossier **{dossier}** removed.\n"))
    }

    pub fn create_dossier(&self, args: CreateArgs) -> Result<()> {
        let meta = self.load(&args.dossier)?;
        let mut root = self.context.connect_for(&meta)?;
        root.open_with_meta(&args.root.root_account, &args.root.password(), &meta, None)?;
        root.create_dossier(&meta, &args.admin.admin_account, &args.admin.password())
            .with_context(|| format!("Failed to create dossier '{}'", args.dossier))?;
        root.close();

        let storage = meta
            .current_period()
            .map(|p| p.storage.clone())
            .unwrap_or_default();
        self.renderer.render(&format!(
            "Dossier **{}** created in `{storage}`.\n",
            args.dossier
        ))
    }

    pub fn run_query(&self, args: QueryArgs) -> Result<()> {
        let meta = self.load(&args.dossier)?;
        let period = period_of(&meta, args.period.as_deref())?;
        let mut cnx = self.context.connect_for(&meta)?;
        cnx.open_with_meta(
            &args.credentials.account,
            &args.credentials.password(),
            &meta,
            Some(&period),
        )?;

        let out = if args.rows {
            cnx.query_rows(&args.sql, true)?.to_string()
        } else {
            cnx.query(&args.sql, true)?;
            "Statement executed.\n".to_string()
        };
        cnx.close();
        self.renderer.render(&out)
    }

    pub fn backup(&self, args: BackupArgs) -> Result<()> {
        let meta = self.load(&args.dossier)?;
        let period = period_of(&meta, args.period.as_deref())?;
        let mut cnx = self.verbose_connect(&meta)?;
        cnx.open_with_meta(
            &args.credentials.account,
            &args.credentials.password(),
            &meta,
            Some(&period),
        )?;
        cnx.backup(&args.file)
            .with_context(|| format!("Failed to back up '{}'", period.storage))?;
        cnx.close();

        self.renderer.render(&format!(
            "Backup of `{}` written to `{}`.\n",
            period.storage, args.file
        ))
    }

    pub fn restore(&self, args: RestoreArgs) -> Result<()> {
        let meta = self.load(&args.dossier)?;
        let period = period_of(&meta, args.period.as_deref())?;
        let mut root = self.verbose_connect(&meta)?;
        root.open_with_meta(&args.root.root_account, &args.root.password(), &meta, None)?;
        root.restore(
            Some(&period),
            &args.file,
            &args.admin.admin_account,
            &args.admin.password(),
        )
        .with_context(|| format!("Failed to restore '{}'", period.storage))?;
        root.close();

        self.renderer.render(&format!(
            "`{}` restored from `{}`.\n",
            period.storage, args.file
        ))
    }

    pub fn archive(&self, args: ArchiveArgs) -> Result<()> {
        let meta = self.load(&args.dossier)?;
        let current = period_of(&meta, None)?;
        let mut cnx = self.verbose_connect(&meta)?;
        cnx.open_with_meta(
            &args.credentials.account,
            &args.credentials.password(),
            &meta,
            Some(&current),
        )?;
        let period = cnx
            .archive_and_new(
                &args.root.root_account,
                &args.root.password(),
                args.begin,
                args.end,
            )
            .with_context(|| format!("Failed to archive '{}'", current.storage))?;
        cnx.close();

        self.renderer.render(&format!(
            "Period `{}` archived, new current period: {period}\n",
            current.storage
        ))
    }

    pub fn handle_period_command(&self, command: PeriodCommands) -> Result<()> {
        match command {
            PeriodCommands::Current { dossier } => {
                let meta = self.load(&dossier)?;
                match meta.current_period() {
                    Some(period) => self.renderer.render(&format!("{period}\n")),
                    None => self.renderer.render("No current period.\n"),
                }
            }
            PeriodCommands::SetCurrent { dossier, storage } => {
                let mut meta = self.load(&dossier)?;
                let period = period_of(&meta, Some(&storage))?;
                meta.update_period(&storage, true, period.begin, period.end)?;
                self.renderer
                    .render(&format!("`{storage}` is now the current period.\n"))
            }
            PeriodCommands::Find {
                dossier,
                begin,
                end,
            } => {
                let meta = self.load(&dossier)?;
                match self.context.period_for(&meta, begin, end)? {
                    Some(period) => self.renderer.render(&format!("{period}\n")),
                    None => self.renderer.render("No matching period.\n"),
                }
            }
            PeriodCommands::Remove { dossier, storage } => {
                let mut meta = self.load(&dossier)?;
                meta.remove_period(&storage)?;
                if meta.is_removed() {
                    self.renderer.render(&format!(
                        "`{storage}` was the last period: dossier **{dossier}** removed.\n"
                    ))
                } else {
                    self.renderer
                        .render(&format!("Period `{storage}` removed.\n"))
                }
            }
        }
    }

    fn load(&self, dossier: &str) -> Result<DbMeta> {
        self.context
            .directory()
            .load(dossier)
            .with_context(|| format!("Failed to load dossier '{dossier}'"))
    }

    fn verbose_connect(&self, meta: &DbMeta) -> Result<Connect> {
        debug!("Showing external tool output for '{}'", meta.dossier_name());
        Ok(self
            .context
            .connect_for(meta)?
            .with_monitor(Box::new(LiveOutput)))
    }
}

/// The named period, or the current one.
fn period_of(meta: &DbMeta, storage: Option<&str>) -> Result<Period> {
    let period = match storage {
        Some(storage) => meta.period(storage),
        None => meta.current_period(),
    };
    period.cloned().ok_or_else(|| {
        DossierError::PeriodNotFound {
            storage: storage.unwrap_or("current period").to_string(),
        }
        .into()
    })
}

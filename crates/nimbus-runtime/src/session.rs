//! Espera cooperativa em primeiro plano.

use anyhow::{Context, Result};
use std::sync::mpsc;

/// Bloqueia até o processo receber um sinal de interrupção (Ctrl-C).
///
/// O handler roda em uma thread própria e acorda esta por um canal, então
/// a espera é interrompível em qualquer ponto, não só entre iterações de
/// um laço de sono.
pub fn wait_for_interrupt() -> Result<()> {
    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .context("failed to install interrupt handler")?;

    rx.recv().context("interrupt channel closed unexpectedly")?;
    Ok(())
}

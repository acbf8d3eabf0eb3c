//! Payment-link delivery
//!
//! One DM with the checkout URL as text and as a button. No retry: if the
//! user is unreachable the payment glue will publish a fresh task when the
//! customer comes back.

use crate::actions::ActionOutcome;
use crate::telegram::TelegramGate;

pub async fn run(gate: &dyn TelegramGate, user_id: i64, payment_link: &str) -> ActionOutcome {
    let text = format!(
        "Hola! 👋 Estás a un paso de entrar al canal.\n\n\
         Pulsa el botón de abajo o usa este enlace para pagar:\n{}\n\n\
         Una vez confirmado, recibirás el acceso automáticamente. 🚀",
        payment_link
    );
    match gate
        .send_with_link_button(user_id, &text, "💳 PAGAR AHORA", payment_link)
        .await
    {
        Ok(()) => ActionOutcome::Success,
        Err(err) => ActionOutcome::Failure(err.to_string()),
    }
}

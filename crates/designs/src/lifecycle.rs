//! Design lifecycle facade.
//!
//! The storefront calls these methods at the points where the design state
//! changes: login, editor link, editor return, add to cart, remove from cart,
//! checkout and order finalization.

use std::sync::Arc;

use chrono::Utc;
use loose_gallery_core::{CartLineKey, FinalizeTrigger, OrderId, ProductId, Visitor};
use tracing::{debug, info, instrument, warn};

use crate::api::{ApiClients, DesignApi, EditorRequest, LooseGalleryClient};
use crate::cart::{Cart, CartLine, bind_on_add_to_cart, validate_copyright_agreement};
use crate::catalog::{Catalog, ProductDesignConfig};
use crate::config::{DesignConfig, LockTriggers};
use crate::error::DesignError;
use crate::handshake::{PendingEdit, PendingEdits};
use crate::order::{FinalizeReport, Order, lock_order_designs};
use crate::store::{AccountTier, DesignMap, DesignStore, PgAccountTier, SessionTier};

/// Entry point for every design state change.
///
/// Clones share the store, the clients and the pending-edit markers.
pub struct DesignLifecycle<A = LooseGalleryClient> {
    store: DesignStore,
    clients: Arc<ApiClients<A>>,
    catalog: Arc<dyn Catalog>,
    pending: PendingEdits,
    lock_triggers: LockTriggers,
}

impl<A> Clone for DesignLifecycle<A> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            clients: Arc::clone(&self.clients),
            catalog: Arc::clone(&self.catalog),
            pending: self.pending.clone(),
            lock_triggers: self.lock_triggers,
        }
    }
}

impl<A> std::fmt::Debug for DesignLifecycle<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DesignLifecycle")
            .field("store", &self.store)
            .field("pending", &self.pending)
            .field("lock_triggers", &self.lock_triggers)
            .finish_non_exhaustive()
    }
}

impl DesignLifecycle<LooseGalleryClient> {
    /// Build the lifecycle from configuration.
    ///
    /// Uses the `PostgreSQL` account tier when a database URL is configured,
    /// an in-memory one otherwise.
    ///
    /// # Errors
    ///
    /// Returns `DesignError` if an HTTP client cannot be built or the
    /// database is unreachable.
    pub async fn from_config(
        config: &DesignConfig,
        catalog: Arc<dyn Catalog>,
    ) -> Result<Self, DesignError> {
        use secrecy::ExposeSecret;

        let clients = ApiClients::from_config(config)?;
        let account = match &config.database_url {
            Some(url) => AccountTier::Postgres(PgAccountTier::connect(url.expose_secret()).await?),
            None => AccountTier::Memory(crate::store::MemoryAccountTier::new()),
        };
        let store = DesignStore::new(
            SessionTier::with_capacity(config.session_ttl, config.session_capacity),
            account,
        );

        Ok(Self::new(store, clients, catalog, config.lock_triggers))
    }
}

impl<A: DesignApi> DesignLifecycle<A> {
    #[must_use]
    pub fn new(
        store: DesignStore,
        clients: ApiClients<A>,
        catalog: Arc<dyn Catalog>,
        lock_triggers: LockTriggers,
    ) -> Self {
        Self {
            store,
            clients: Arc::new(clients),
            catalog,
            pending: PendingEdits::default(),
            lock_triggers,
        }
    }

    /// Replace the pending-edit markers (e.g. to share them between instances).
    #[must_use]
    pub fn with_pending_edits(mut self, pending: PendingEdits) -> Self {
        self.pending = pending;
        self
    }

    #[must_use]
    pub const fn store(&self) -> &DesignStore {
        &self.store
    }

    #[must_use]
    pub fn clients(&self) -> &ApiClients<A> {
        &self.clients
    }

    #[must_use]
    pub fn catalog(&self) -> &dyn Catalog {
        self.catalog.as_ref()
    }

    #[must_use]
    pub const fn pending(&self) -> &PendingEdits {
        &self.pending
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Merge the visitor's anonymous designs into their account.
    ///
    /// # Errors
    ///
    /// Returns `DesignError::Store` if the account tier fails.
    pub async fn on_login(&self, visitor: &Visitor) -> Result<DesignMap, DesignError> {
        Ok(self.store.merge_on_login(visitor).await?)
    }

    /// Restore a logged-in visitor's designs into a fresh session.
    ///
    /// # Errors
    ///
    /// Returns `DesignError::Store` if the account tier fails.
    pub async fn hydrate(&self, visitor: &Visitor) -> Result<DesignMap, DesignError> {
        Ok(self.store.hydrate(visitor).await?)
    }

    // =========================================================================
    // Editor links
    // =========================================================================

    /// Link that opens the editor on a product's template.
    ///
    /// # Errors
    ///
    /// Returns `DesignError::InvalidInput` if the product is unknown, not
    /// customizable, or has no API credential.
    #[instrument(skip(self, visitor, product_id), fields(owner = %visitor.owner(), %product_id))]
    pub async fn start_design_link(
        &self,
        visitor: &Visitor,
        product_id: ProductId,
    ) -> Result<String, DesignError> {
        let product = self.customizable_product(product_id)?;
        let (domain_id, template) = editor_target(&product)?;
        let client = self.client_for(&product)?;

        let request = EditorRequest::start(domain_id, template.clone(), product_id);
        self.pending
            .stash(
                &visitor.token,
                PendingEdit {
                    product_id,
                    template_serial: template,
                    editing: None,
                    created_at: Utc::now(),
                },
            )
            .await;

        debug!("Issued start-design link");
        Ok(client.build_editor_url(&request))
    }

    /// Link that reopens the design bound to a cart line.
    ///
    /// # Errors
    ///
    /// Returns `DesignError::StateConflict` if the line does not exist, has
    /// no design, or its design is locked; `DesignError::InvalidInput` if the
    /// product cannot be customized.
    #[instrument(skip(self, visitor, cart, key), fields(owner = %visitor.owner(), cart_line_key = %key))]
    pub async fn edit_cart_line_link(
        &self,
        visitor: &Visitor,
        cart: &Cart,
        key: CartLineKey,
    ) -> Result<String, DesignError> {
        let binding = cart
            .line(key)
            .ok_or_else(|| DesignError::StateConflict("Cart item not found.".to_string()))?
            .design
            .as_ref()
            .ok_or_else(|| {
                DesignError::StateConflict("This cart item has no custom design.".to_string())
            })?;

        let locked = self
            .store
            .get(visitor, binding.product_id)
            .await?
            .is_some_and(|record| record.serial == binding.serial && record.locked);
        if locked {
            return Err(DesignError::StateConflict(format!(
                "Design {} is locked and can no longer be edited.",
                binding.serial
            )));
        }

        let product = self.customizable_product(binding.product_id)?;
        let (domain_id, template) = editor_target(&product)?;
        let client = self.client_for(&product)?;

        let request = EditorRequest::edit(domain_id, template.clone(), binding.serial.clone());
        self.pending
            .stash(
                &visitor.token,
                PendingEdit {
                    product_id: binding.product_id,
                    template_serial: template,
                    editing: Some(key),
                    created_at: Utc::now(),
                },
            )
            .await;

        debug!(serial = %binding.serial, "Issued edit-design link");
        Ok(client.build_editor_url(&request))
    }

    // =========================================================================
    // Cart
    // =========================================================================

    /// Add a product to the cart, binding the visitor's design if any.
    ///
    /// # Errors
    ///
    /// Returns `DesignError::InvalidInput` for unknown products and
    /// `DesignError::Store` if the store fails.
    #[instrument(skip(self, visitor, cart, product_id), fields(owner = %visitor.owner(), %product_id))]
    pub async fn on_add_to_cart(
        &self,
        visitor: &Visitor,
        cart: &mut Cart,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartLineKey, DesignError> {
        let product = self
            .catalog
            .product(product_id)
            .ok_or_else(|| DesignError::InvalidInput("Product not found.".to_string()))?;

        let design = if product.is_customizable() {
            self.store.get(visitor, product_id).await?
        } else {
            None
        };
        let binding = bind_on_add_to_cart(product_id, design.as_ref());
        if let Some(binding) = &binding {
            info!(serial = %binding.serial, cart_line_key = %binding.cart_line_key, "Design bound to cart line");
        }

        Ok(cart.add_line(product_id, product.name, quantity, binding))
    }

    /// Remove a cart line; a bound line also clears the visitor's design for
    /// that product.
    ///
    /// # Errors
    ///
    /// Returns `DesignError::StateConflict` for unknown lines and
    /// `DesignError::Store` if the store fails.
    #[instrument(skip(self, visitor, cart, key), fields(owner = %visitor.owner(), cart_line_key = %key))]
    pub async fn on_remove_line(
        &self,
        visitor: &Visitor,
        cart: &mut Cart,
        key: CartLineKey,
    ) -> Result<CartLine, DesignError> {
        let line = cart
            .remove_line(key)
            .ok_or_else(|| DesignError::StateConflict("Cart item not found.".to_string()))?;

        if let Some(binding) = &line.design {
            self.store.remove(visitor, binding.product_id).await?;
            debug!(serial = %binding.serial, "Cleared design of removed cart line");
        }
        Ok(line)
    }

    // =========================================================================
    // Checkout and orders
    // =========================================================================

    /// Reject checkout of designs without the copyright agreement.
    ///
    /// # Errors
    ///
    /// Returns `DesignError::InvalidInput` when the agreement is required but
    /// missing.
    pub fn validate_checkout(&self, cart: &Cart, agreed: bool) -> Result<(), DesignError> {
        validate_copyright_agreement(cart, agreed)
    }

    /// Freeze the cart into an order placed by `visitor`.
    #[must_use]
    pub fn on_checkout(&self, visitor: &Visitor, order_id: OrderId, cart: &Cart) -> Order {
        let order = Order::from_cart(order_id, cart, Utc::now()).with_buyer(visitor);
        if order.has_designs() {
            info!(%order_id, designs = order.design_summaries().len(), "Order created with designs");
        }
        order
    }

    /// Lock the order's designs.
    ///
    /// Disabled triggers do nothing. Newly locked designs are also flagged
    /// in the store of `visitor`, or of the order's buyer when no visitor is
    /// at hand (e.g. the admin completes the order). Never fails: lock and
    /// store errors end up in order notes and logs.
    #[instrument(skip(self, order, trigger, visitor), fields(order_id = %order.id, %trigger))]
    pub async fn on_order_finalized(
        &self,
        order: &mut Order,
        trigger: FinalizeTrigger,
        visitor: Option<&Visitor>,
    ) -> FinalizeReport {
        let enabled = match trigger {
            FinalizeTrigger::ThankYou => self.lock_triggers.on_thank_you,
            FinalizeTrigger::Completed => self.lock_triggers.on_completed,
        };
        if !enabled {
            debug!("Lock trigger disabled");
            return FinalizeReport::default();
        }

        let report =
            lock_order_designs(order, self.catalog.as_ref(), &self.clients, trigger).await;

        if let Some(visitor) = visitor.or(order.buyer.as_ref()) {
            for locked in &report.locked {
                if let Err(e) = self
                    .store
                    .mark_locked(visitor, locked.product_id, &locked.serial)
                    .await
                {
                    warn!(serial = %locked.serial, error = %e, "Failed to flag stored design as locked");
                }
            }
        }

        info!(
            locked = report.locked.len(),
            already_locked = report.already_locked,
            failed = report.failed,
            skipped = report.skipped,
            "Order designs finalized"
        );
        report
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn customizable_product(&self, product_id: ProductId) -> Result<ProductDesignConfig, DesignError> {
        let product = self
            .catalog
            .product(product_id)
            .ok_or_else(|| DesignError::InvalidInput("Product not found.".to_string()))?;
        if !product.is_customizable() {
            return Err(DesignError::InvalidInput(
                "This product cannot be customized.".to_string(),
            ));
        }
        Ok(product)
    }

    fn client_for(&self, product: &ProductDesignConfig) -> Result<&A, DesignError> {
        self.clients.for_product(product).ok_or_else(|| {
            DesignError::InvalidInput(format!(
                "No API credential configured for product {}.",
                product.product_id
            ))
        })
    }
}

fn editor_target(
    product: &ProductDesignConfig,
) -> Result<(String, loose_gallery_core::Serial), DesignError> {
    product
        .editor_target()
        .map(|(domain, template)| (domain.to_string(), template.clone()))
        .ok_or_else(|| DesignError::InvalidInput("This product cannot be customized.".to_string()))
}

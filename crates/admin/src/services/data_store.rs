//! Sales, resellers and inventory.
//!
//! The shared in-memory substrate read by analytics and backups. All three
//! collections sit behind one lock so a snapshot is always consistent.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::instrument;

use agencia_check_core::{
    Email, Money, PaymentMethod, Permission, ProductId, ResellerId, SaleId, SaleStatus,
};

use crate::clock::SharedClock;
use crate::models::{
    CurrentUser, InventoryItem, NewInventoryItem, NewReseller, NewSale, Reseller,
    ResellerUpdate, Sale, SaleUpdate,
};

use super::error::{ServiceError, ServiceResult, require};
use super::notifications::{NotificationService, TemplateId, TemplateVars};

/// A consistent copy of every collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSnapshot {
    pub sales: Vec<Sale>,
    pub resellers: Vec<Reseller>,
    pub inventory: Vec<InventoryItem>,
}

/// Collections to swap in. `None` leaves a collection untouched.
#[derive(Debug, Clone, Default)]
pub struct DataSections {
    pub sales: Option<Vec<Sale>>,
    pub resellers: Option<Vec<Reseller>>,
    pub inventory: Option<Vec<InventoryItem>>,
}

#[derive(Debug, Default)]
struct Collections {
    sales: Vec<Sale>,
    resellers: Vec<Reseller>,
    inventory: Vec<InventoryItem>,
    next_sale: i32,
    next_reseller: i32,
    next_product: i32,
}

impl Collections {
    /// Keep counters ahead of every id currently present.
    fn resync_counters(&mut self) {
        let max_sale = self.sales.iter().map(|s| s.id.as_i32()).max().unwrap_or(0);
        let max_reseller = self.resellers.iter().map(|r| r.id.as_i32()).max().unwrap_or(0);
        let max_product = self.inventory.iter().map(|i| i.id.as_i32()).max().unwrap_or(0);
        self.next_sale = self.next_sale.max(max_sale);
        self.next_reseller = self.next_reseller.max(max_reseller);
        self.next_product = self.next_product.max(max_product);
    }
}

/// Advance an id counter. Fails once the id space is used up, which only
/// happens after restoring records with ids near `i32::MAX`.
fn next_id(counter: &mut i32, what: &str) -> ServiceResult<i32> {
    let next = counter.checked_add(1).ok_or_else(|| {
        ServiceError::Conflict(format!("limite de identificadores de {what} atingido"))
    })?;
    *counter = next;
    Ok(next)
}

/// Handle to the business data. Cheap to clone.
#[derive(Clone)]
pub struct DataStore {
    data: Arc<RwLock<Collections>>,
    clock: SharedClock,
    notifications: Option<NotificationService>,
}

impl std::fmt::Debug for DataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataStore")
            .field("notifications", &self.notifications.is_some())
            .finish_non_exhaustive()
    }
}

fn validate_value(value: Money) -> ServiceResult<()> {
    if value.is_negative() || value.amount().is_zero() {
        return Err(ServiceError::Validation(
            "o valor da venda deve ser positivo".into(),
        ));
    }
    Ok(())
}

fn validate_commission(rate: Decimal) -> ServiceResult<()> {
    if rate < Decimal::ZERO || rate > Decimal::ONE {
        return Err(ServiceError::Validation(
            "a comissão deve estar entre 0 e 1".into(),
        ));
    }
    Ok(())
}

fn required_text(value: &str, field: &str) -> ServiceResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ServiceError::Validation(format!("{field} é obrigatório")));
    }
    Ok(value.to_string())
}

impl DataStore {
    /// Create an empty store.
    #[must_use]
    pub fn new(clock: SharedClock) -> Self {
        Self {
            data: Arc::new(RwLock::new(Collections::default())),
            clock,
            notifications: None,
        }
    }

    /// Emit sale, reseller and stock events through `notifications`.
    #[must_use]
    pub fn with_notifications(mut self, notifications: NotificationService) -> Self {
        self.notifications = Some(notifications);
        self
    }

    async fn emit(&self, template: TemplateId, vars: TemplateVars) {
        if let Some(notifications) = &self.notifications
            && let Err(e) = notifications.notify(template, &vars).await
        {
            tracing::warn!(template = %template, error = %e, "Failed to emit notification");
        }
    }

    // =========================================================================
    // Snapshot / restore
    // =========================================================================

    /// Clone every collection.
    pub async fn snapshot(&self) -> DataSnapshot {
        let data = self.data.read().await;
        DataSnapshot {
            sales: data.sales.clone(),
            resellers: data.resellers.clone(),
            inventory: data.inventory.clone(),
        }
    }

    /// Swap in the provided collections. Id counters never move backwards.
    #[instrument(skip_all)]
    pub async fn replace(&self, sections: DataSections) {
        let mut data = self.data.write().await;
        if let Some(sales) = sections.sales {
            tracing::info!(count = sales.len(), "Replacing sales");
            data.sales = sales;
        }
        if let Some(resellers) = sections.resellers {
            tracing::info!(count = resellers.len(), "Replacing resellers");
            data.resellers = resellers;
        }
        if let Some(inventory) = sections.inventory {
            tracing::info!(count = inventory.len(), "Replacing inventory");
            data.inventory = inventory;
        }
        data.resync_counters();
    }

    // =========================================================================
    // Sales
    // =========================================================================

    /// List sales, newest first.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` without `ViewSales`.
    pub async fn list_sales(&self, actor: &CurrentUser) -> ServiceResult<Vec<Sale>> {
        require(actor, Permission::ViewSales)?;
        let mut sales = self.data.read().await.sales.clone();
        sales.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(sales)
    }

    /// Fetch one sale.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` without `ViewSales`, `NotFound` for an unknown id.
    pub async fn get_sale(&self, actor: &CurrentUser, id: SaleId) -> ServiceResult<Sale> {
        require(actor, Permission::ViewSales)?;
        self.data
            .read()
            .await
            .sales
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or(ServiceError::NotFound("Venda"))
    }

    /// Register a sale.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` without `ManageSales`, or a validation error.
    #[instrument(skip(self, actor, input), fields(actor = %actor.id))]
    pub async fn create_sale(&self, actor: &CurrentUser, input: NewSale) -> ServiceResult<Sale> {
        require(actor, Permission::ManageSales)?;
        validate_value(input.value)?;
        let quantity = input.quantity.unwrap_or(1);
        if quantity == 0 {
            return Err(ServiceError::Validation("a quantidade deve ser positiva".into()));
        }

        let now = self.clock.now();
        let sale = {
            let mut data = self.data.write().await;
            let id = next_id(&mut data.next_sale, "vendas")?;
            let sale = Sale {
                id: SaleId::new(id),
                value: input.value,
                date: input.date.unwrap_or(now),
                status: input.status,
                reseller_id: input.reseller_id,
                customer: input.customer.filter(|c| !c.trim().is_empty()),
                product_id: input.product_id,
                quantity,
                payment_method: input.payment_method,
                delivered_at: (input.status == SaleStatus::Completed).then_some(now),
            };
            data.sales.push(sale.clone());
            sale
        };

        tracing::info!(sale_id = %sale.id, value = %sale.value, "Sale created");
        self.emit(
            TemplateId::SaleCreated,
            TemplateVars::new()
                .with("sale_id", sale.id)
                .with("value", sale.value.to_brl()),
        )
        .await;
        if sale.status == SaleStatus::Paid {
            self.emit_payment(&sale).await;
        }
        Ok(sale)
    }

    async fn emit_payment(&self, sale: &Sale) {
        let method = match sale.payment_method {
            PaymentMethod::Pix => "PIX",
            PaymentMethod::CreditCard => "cartão de crédito",
            PaymentMethod::DebitCard => "cartão de débito",
            PaymentMethod::Cash => "dinheiro",
            PaymentMethod::Boleto => "boleto",
        };
        self.emit(
            TemplateId::PaymentReceived,
            TemplateVars::new()
                .with("sale_id", sale.id)
                .with("value", sale.value.to_brl())
                .with("method", method),
        )
        .await;
    }

    /// Update a sale. Moving to `completed` stamps `delivered_at` if unset;
    /// moving to `paid` emits a payment notification.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` without `ManageSales`, `NotFound`, or a validation
    /// error.
    #[instrument(skip(self, actor, update), fields(actor = %actor.id))]
    pub async fn update_sale(
        &self,
        actor: &CurrentUser,
        id: SaleId,
        update: SaleUpdate,
    ) -> ServiceResult<Sale> {
        require(actor, Permission::ManageSales)?;
        if let Some(value) = update.value {
            validate_value(value)?;
        }

        let now = self.clock.now();
        let (sale, became_paid) = {
            let mut data = self.data.write().await;
            let sale = data
                .sales
                .iter_mut()
                .find(|s| s.id == id)
                .ok_or(ServiceError::NotFound("Venda"))?;
            let previous = sale.status;

            if let Some(value) = update.value {
                sale.value = value;
            }
            if let Some(status) = update.status {
                sale.status = status;
            }
            if let Some(reseller_id) = update.reseller_id {
                sale.reseller_id = Some(reseller_id);
            }
            if let Some(customer) = update.customer {
                sale.customer = Some(customer).filter(|c| !c.trim().is_empty());
            }
            if let Some(delivered_at) = update.delivered_at {
                sale.delivered_at = Some(delivered_at);
            }
            if sale.status == SaleStatus::Completed && sale.delivered_at.is_none() {
                sale.delivered_at = Some(now);
            }
            (
                sale.clone(),
                previous != SaleStatus::Paid && sale.status == SaleStatus::Paid,
            )
        };

        tracing::info!(sale_id = %id, status = sale.status.as_str(), "Sale updated");
        if became_paid {
            self.emit_payment(&sale).await;
        }
        Ok(sale)
    }

    /// Delete a sale.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` without `ManageSales`, `NotFound` for an unknown id.
    pub async fn delete_sale(&self, actor: &CurrentUser, id: SaleId) -> ServiceResult<()> {
        require(actor, Permission::ManageSales)?;
        let mut data = self.data.write().await;
        let before = data.sales.len();
        data.sales.retain(|s| s.id != id);
        if data.sales.len() == before {
            return Err(ServiceError::NotFound("Venda"));
        }
        tracing::info!(sale_id = %id, "Sale deleted");
        Ok(())
    }

    // =========================================================================
    // Resellers
    // =========================================================================

    /// List resellers.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` without `ViewResellers`.
    pub async fn list_resellers(&self, actor: &CurrentUser) -> ServiceResult<Vec<Reseller>> {
        require(actor, Permission::ViewResellers)?;
        Ok(self.data.read().await.resellers.clone())
    }

    /// Register a reseller.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` without `ManageResellers`, a validation error, or
    /// `Conflict` when the email is already registered.
    #[instrument(skip(self, actor, input), fields(actor = %actor.id))]
    pub async fn create_reseller(
        &self,
        actor: &CurrentUser,
        input: NewReseller,
    ) -> ServiceResult<Reseller> {
        require(actor, Permission::ManageResellers)?;
        let name = required_text(&input.name, "nome")?;
        let email = Email::parse(&input.email)?;
        validate_commission(input.commission_rate)?;

        let now = self.clock.now();
        let reseller = {
            let mut data = self.data.write().await;
            if data.resellers.iter().any(|r| r.email == email) {
                return Err(ServiceError::Conflict(format!(
                    "Já existe um revendedor com o email {email}"
                )));
            }
            let id = next_id(&mut data.next_reseller, "revendedores")?;
            let reseller = Reseller {
                id: ResellerId::new(id),
                name,
                email,
                phone: input.phone.filter(|p| !p.trim().is_empty()),
                commission_rate: input.commission_rate,
                is_active: true,
                created_at: now,
            };
            data.resellers.push(reseller.clone());
            reseller
        };

        tracing::info!(reseller_id = %reseller.id, "Reseller registered");
        self.emit(
            TemplateId::ResellerRegistered,
            TemplateVars::new().with("name", &reseller.name),
        )
        .await;
        Ok(reseller)
    }

    /// Update a reseller.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` without `ManageResellers`, `NotFound`, or a
    /// validation error.
    pub async fn update_reseller(
        &self,
        actor: &CurrentUser,
        id: ResellerId,
        update: ResellerUpdate,
    ) -> ServiceResult<Reseller> {
        require(actor, Permission::ManageResellers)?;
        let name = update
            .name
            .as_deref()
            .map(|n| required_text(n, "nome"))
            .transpose()?;
        if let Some(rate) = update.commission_rate {
            validate_commission(rate)?;
        }

        let mut data = self.data.write().await;
        let reseller = data
            .resellers
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(ServiceError::NotFound("Revendedor"))?;
        if let Some(name) = name {
            reseller.name = name;
        }
        if let Some(phone) = update.phone {
            reseller.phone = Some(phone).filter(|p| !p.trim().is_empty());
        }
        if let Some(rate) = update.commission_rate {
            reseller.commission_rate = rate;
        }
        if let Some(is_active) = update.is_active {
            reseller.is_active = is_active;
        }
        Ok(reseller.clone())
    }

    /// Delete a reseller. Sales keep their dangling `reseller_id`.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` without `ManageResellers`, `NotFound` for an
    /// unknown id.
    pub async fn delete_reseller(&self, actor: &CurrentUser, id: ResellerId) -> ServiceResult<()> {
        require(actor, Permission::ManageResellers)?;
        let mut data = self.data.write().await;
        let before = data.resellers.len();
        data.resellers.retain(|r| r.id != id);
        if data.resellers.len() == before {
            return Err(ServiceError::NotFound("Revendedor"));
        }
        tracing::info!(reseller_id = %id, "Reseller deleted");
        Ok(())
    }

    // =========================================================================
    // Inventory
    // =========================================================================

    /// List inventory items.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` without `ViewInventory`.
    pub async fn list_inventory(&self, actor: &CurrentUser) -> ServiceResult<Vec<InventoryItem>> {
        require(actor, Permission::ViewInventory)?;
        Ok(self.data.read().await.inventory.clone())
    }

    /// Items at or below their reorder threshold.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` without `ViewInventory`.
    pub async fn low_stock(&self, actor: &CurrentUser) -> ServiceResult<Vec<InventoryItem>> {
        require(actor, Permission::ViewInventory)?;
        Ok(self
            .data
            .read()
            .await
            .inventory
            .iter()
            .filter(|i| i.is_low_stock())
            .cloned()
            .collect())
    }

    /// Add an inventory item.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` without `ManageInventory`, a validation error, or
    /// `Conflict` for a duplicate SKU.
    #[instrument(skip(self, actor, input), fields(actor = %actor.id, sku = %input.sku))]
    pub async fn create_item(
        &self,
        actor: &CurrentUser,
        input: NewInventoryItem,
    ) -> ServiceResult<InventoryItem> {
        require(actor, Permission::ManageInventory)?;
        let sku = required_text(&input.sku, "SKU")?;
        let name = required_text(&input.name, "nome")?;
        if input.unit_price.is_negative() || input.unit_cost.is_negative() {
            return Err(ServiceError::Validation("preços não podem ser negativos".into()));
        }

        let now = self.clock.now();
        let item = {
            let mut data = self.data.write().await;
            if data.inventory.iter().any(|i| i.sku.eq_ignore_ascii_case(&sku)) {
                return Err(ServiceError::Conflict(format!("SKU {sku} já cadastrado")));
            }
            let id = next_id(&mut data.next_product, "produtos")?;
            let item = InventoryItem {
                id: ProductId::new(id),
                sku,
                name,
                quantity: input.quantity,
                min_quantity: input.min_quantity,
                unit_price: input.unit_price,
                unit_cost: input.unit_cost,
                updated_at: now,
            };
            data.inventory.push(item.clone());
            item
        };

        tracing::info!(product_id = %item.id, "Inventory item created");
        if item.is_low_stock() {
            self.emit_low_stock(&item).await;
        }
        Ok(item)
    }

    /// Add `delta` units (negative removes). Removing more than is in stock
    /// is rejected and leaves the quantity unchanged.
    ///
    /// Emits a low-stock notification when the item crosses its threshold.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` without `ManageInventory`, `NotFound`, or a
    /// validation error when the result would be negative.
    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn adjust_stock(
        &self,
        actor: &CurrentUser,
        id: ProductId,
        delta: i64,
    ) -> ServiceResult<InventoryItem> {
        require(actor, Permission::ManageInventory)?;
        let now = self.clock.now();
        let (item, crossed) = {
            let mut data = self.data.write().await;
            let item = data
                .inventory
                .iter_mut()
                .find(|i| i.id == id)
                .ok_or(ServiceError::NotFound("Produto"))?;

            let next = i64::from(item.quantity) + delta;
            let quantity = u32::try_from(next).map_err(|_| {
                ServiceError::Validation(format!(
                    "estoque insuficiente: {} disponíveis",
                    item.quantity
                ))
            })?;

            let was_low = item.is_low_stock();
            item.quantity = quantity;
            item.updated_at = now;
            (item.clone(), !was_low && item.is_low_stock())
        };

        tracing::info!(product_id = %id, delta, quantity = item.quantity, "Stock adjusted");
        if crossed {
            self.emit_low_stock(&item).await;
        }
        Ok(item)
    }

    async fn emit_low_stock(&self, item: &InventoryItem) {
        self.emit(
            TemplateId::LowStock,
            TemplateVars::new()
                .with("product", &item.name)
                .with("quantity", item.quantity)
                .with("min_quantity", item.min_quantity),
        )
        .await;
    }

    /// Remove an inventory item.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` without `ManageInventory`, `NotFound` for an
    /// unknown id.
    pub async fn delete_item(&self, actor: &CurrentUser, id: ProductId) -> ServiceResult<()> {
        require(actor, Permission::ManageInventory)?;
        let mut data = self.data.write().await;
        let before = data.inventory.len();
        data.inventory.retain(|i| i.id != id);
        if data.inventory.len() == before {
            return Err(ServiceError::NotFound("Produto"));
        }
        Ok(())
    }

    // =========================================================================
    // Demo data
    // =========================================================================

    /// Fill an empty store with a small, deterministic data set spread over
    /// the last 60 days. Does nothing if any collection already has records.
    pub async fn seed_demo_data(&self) {
        let now = self.clock.now();
        let mut data = self.data.write().await;
        if !data.sales.is_empty() || !data.resellers.is_empty() || !data.inventory.is_empty() {
            return;
        }

        let demo_resellers = [
            ("Ana Souza", "ana.souza@revenda.com.br", "0.10"),
            ("Bruno Lima", "bruno.lima@revenda.com.br", "0.12"),
            ("Carla Dias", "carla.dias@revenda.com.br", "0.08"),
        ];
        for (index, (name, email, rate)) in (1..).zip(demo_resellers) {
            let Ok(email) = Email::parse(email) else {
                continue;
            };
            data.resellers.push(Reseller {
                id: ResellerId::new(index),
                name: name.to_string(),
                email,
                phone: None,
                commission_rate: rate.parse().unwrap_or_default(),
                is_active: index != 3,
                created_at: now - chrono::Duration::days(90),
            });
        }

        let demo_items = [
            ("KIT-001", "Kit Check Básico", 40, 10, 8990, 4500),
            ("KIT-002", "Kit Check Premium", 6, 8, 15990, 8000),
            ("ACC-010", "Capa Protetora", 120, 20, 2990, 900),
        ];
        for (index, (sku, name, quantity, min, price, cost)) in (1..).zip(demo_items) {
            data.inventory.push(InventoryItem {
                id: ProductId::new(index),
                sku: sku.to_string(),
                name: name.to_string(),
                quantity,
                min_quantity: min,
                unit_price: Money::from_cents(price),
                unit_cost: Money::from_cents(cost),
                updated_at: now,
            });
        }

        let statuses = [
            SaleStatus::Completed,
            SaleStatus::Paid,
            SaleStatus::Completed,
            SaleStatus::Pending,
            SaleStatus::Cancelled,
        ];
        let methods = [
            PaymentMethod::Pix,
            PaymentMethod::CreditCard,
            PaymentMethod::Boleto,
        ];
        for index in 1..=40_i32 {
            let date = now - chrono::Duration::hours(i64::from(index) * 36);
            let status = statuses
                .get(usize::try_from(index).unwrap_or(0) % statuses.len())
                .copied()
                .unwrap_or_default();
            let product = index % 3 + 1;
            let price = demo_items
                .get(usize::try_from(product - 1).unwrap_or(0))
                .map_or(Money::ZERO, |item| Money::from_cents(item.4));
            let quantity = u32::try_from(index % 2 + 1).unwrap_or(1);
            data.sales.push(Sale {
                id: SaleId::new(index),
                value: price.times(quantity),
                date,
                status,
                reseller_id: Some(ResellerId::new(index % 3 + 1)),
                customer: Some(format!("cliente{}@email.com", index % 17)),
                product_id: Some(ProductId::new(product)),
                quantity,
                payment_method: methods
                    .get(usize::try_from(index).unwrap_or(0) % methods.len())
                    .copied()
                    .unwrap_or_default(),
                delivered_at: (status == SaleStatus::Completed)
                    .then(|| date + chrono::Duration::hours(i64::from(index % 5) * 12 + 6)),
            });
        }

        data.resync_counters();
        tracing::info!(
            sales = data.sales.len(),
            resellers = data.resellers.len(),
            inventory = data.inventory.len(),
            "Seeded demo data"
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use agencia_check_core::{UserId, UserRole};
    use chrono::{TimeZone, Utc};

    fn actor(role: UserRole) -> CurrentUser {
        CurrentUser {
            id: UserId::new(1),
            email: Email::parse("teste@agencia.com.br").unwrap(),
            name: "Teste".into(),
            role,
        }
    }

    fn store() -> DataStore {
        DataStore::new(FixedClock::shared(
            Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        ))
    }

    fn new_sale(cents: i64) -> NewSale {
        NewSale {
            value: Money::from_cents(cents),
            date: None,
            status: SaleStatus::Pending,
            reseller_id: None,
            customer: Some("cliente@email.com".into()),
            product_id: None,
            quantity: None,
            payment_method: PaymentMethod::Pix,
        }
    }

    fn new_item(quantity: u32, min_quantity: u32) -> NewInventoryItem {
        NewInventoryItem {
            sku: "SKU-1".into(),
            name: "Produto".into(),
            quantity,
            min_quantity,
            unit_price: Money::from_cents(1000),
            unit_cost: Money::from_cents(500),
        }
    }

    #[tokio::test]
    async fn test_sale_crud_assigns_monotonic_ids() {
        let store = store();
        let sales = actor(UserRole::Sales);
        let a = store.create_sale(&sales, new_sale(1000)).await.unwrap();
        let b = store.create_sale(&sales, new_sale(2000)).await.unwrap();
        assert!(b.id > a.id);
        assert_eq!(a.quantity, 1);

        store.delete_sale(&sales, a.id).await.unwrap();
        let c = store.create_sale(&sales, new_sale(3000)).await.unwrap();
        assert!(c.id > b.id);
        assert_eq!(store.list_sales(&sales).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_viewer_cannot_write() {
        let store = store();
        let viewer = actor(UserRole::Viewer);
        let result = store.create_sale(&viewer, new_sale(1000)).await;
        assert!(matches!(
            result,
            Err(ServiceError::Forbidden(Permission::ManageSales))
        ));
        assert!(store.snapshot().await.sales.is_empty());
        assert!(store.list_sales(&viewer).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sale_value_must_be_positive() {
        let store = store();
        let result = store.create_sale(&actor(UserRole::Admin), new_sale(0)).await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn test_completing_sale_stamps_delivery() {
        let store = store();
        let admin = actor(UserRole::Admin);
        let sale = store.create_sale(&admin, new_sale(1000)).await.unwrap();
        assert!(sale.delivered_at.is_none());

        let updated = store
            .update_sale(
                &admin,
                sale.id,
                SaleUpdate {
                    status: Some(SaleStatus::Completed),
                    ..SaleUpdate::default()
                },
            )
            .await
            .unwrap();
        assert!(updated.delivered_at.is_some());
    }

    #[tokio::test]
    async fn test_adjust_stock_never_negative() {
        let store = store();
        let manager = actor(UserRole::Manager);
        let item = store.create_item(&manager, new_item(5, 2)).await.unwrap();

        let result = store.adjust_stock(&manager, item.id, -6).await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
        assert_eq!(store.snapshot().await.inventory[0].quantity, 5);

        let item = store.adjust_stock(&manager, item.id, -5).await.unwrap();
        assert_eq!(item.quantity, 0);
    }

    #[tokio::test]
    async fn test_low_stock_listing() {
        let store = store();
        let manager = actor(UserRole::Manager);
        let item = store.create_item(&manager, new_item(5, 2)).await.unwrap();
        assert!(store.low_stock(&manager).await.unwrap().is_empty());

        store.adjust_stock(&manager, item.id, -3).await.unwrap();
        let low = store.low_stock(&manager).await.unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].id, item.id);
    }

    #[tokio::test]
    async fn test_duplicate_sku_and_reseller_email() {
        let store = store();
        let admin = actor(UserRole::Admin);
        store.create_item(&admin, new_item(1, 0)).await.unwrap();
        let mut dup = new_item(1, 0);
        dup.sku = "sku-1".into();
        assert!(matches!(
            store.create_item(&admin, dup).await,
            Err(ServiceError::Conflict(_))
        ));

        let reseller = NewReseller {
            name: "Ana".into(),
            email: "ana@revenda.com.br".into(),
            phone: None,
            commission_rate: Decimal::new(10, 2),
        };
        store.create_reseller(&admin, reseller.clone()).await.unwrap();
        assert!(matches!(
            store.create_reseller(&admin, reseller).await,
            Err(ServiceError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_replace_keeps_counters_ahead() {
        let store = store();
        let admin = actor(UserRole::Admin);
        let sale = store.create_sale(&admin, new_sale(1000)).await.unwrap();

        let mut restored = sale.clone();
        restored.id = SaleId::new(50);
        store
            .replace(DataSections {
                sales: Some(vec![restored]),
                ..DataSections::default()
            })
            .await;

        let next = store.create_sale(&admin, new_sale(1000)).await.unwrap();
        assert_eq!(next.id, SaleId::new(51));
    }

    #[tokio::test]
    async fn test_exhausted_id_space_rejects_create() {
        let store = store();
        let admin = actor(UserRole::Admin);
        let mut restored = store.create_sale(&admin, new_sale(1000)).await.unwrap();
        restored.id = SaleId::new(i32::MAX);
        store
            .replace(DataSections {
                sales: Some(vec![restored]),
                ..DataSections::default()
            })
            .await;

        assert!(matches!(
            store.create_sale(&admin, new_sale(1000)).await,
            Err(ServiceError::Conflict(_))
        ));
        assert_eq!(store.list_sales(&admin).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_seed_demo_data_once() {
        let store = store();
        store.seed_demo_data().await;
        let first = store.snapshot().await;
        assert_eq!(first.sales.len(), 40);
        assert_eq!(first.resellers.len(), 3);

        store.seed_demo_data().await;
        assert_eq!(store.snapshot().await, first);
    }
}

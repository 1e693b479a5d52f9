//! In-process wiring: event store, command dispatcher, read models.
//!
//! Read models are updated inline from the events each command commits, so a
//! successful response is immediately visible to the next query. Commits and
//! their projection run under one lock, so every stream reaches the read
//! models in sequence order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;

use realty_core::{Aggregate, AggregateId, TenantId};
use realty_estate::{
    Catalog, CreateProperty, MarkSold, Property, PropertyCommand, PropertyId, PropertyTag,
    PropertyType, PropertyTypeId, SetClassification, TagId,
};
use realty_estate_account::{BillingPolicy, sale_invoice};
use realty_infra::{
    command_dispatcher::{CommandDispatcher, DispatchError},
    event_store::{InMemoryEventStore, StoredEvent},
    projections::{
        INVOICE_AGGREGATE, InvoiceReadModel, InvoicesProjection, PRODUCT_AGGREGATE,
        PROPERTY_AGGREGATE, ProductCatalogProjection, ProductReadModel, PropertiesProjection,
        PropertyReadModel,
    },
    read_model::InMemoryTenantStore,
};
use realty_invoicing::{
    GlobalDocumentId, Invoice, InvoiceCommand, InvoiceId, IssueInvoice, RecordDocumentState,
    RoundingMethod, TaxDocument, build_batch, build_global_document, build_invoice_document,
};
use realty_products::{CreateProduct, Product, ProductCommand, ProductId};

use crate::config::ApiConfig;

type Store = Arc<InMemoryEventStore>;
type Properties = PropertiesProjection<Arc<InMemoryTenantStore<PropertyId, PropertyReadModel>>>;
type Products = ProductCatalogProjection<Arc<InMemoryTenantStore<ProductId, ProductReadModel>>>;
type Invoices = InvoicesProjection<Arc<InMemoryTenantStore<InvoiceId, InvoiceReadModel>>>;

/// Outcome of marking a property sold.
#[derive(Debug, Clone, Serialize)]
pub struct SaleOutcome {
    pub events_committed: usize,
    /// Invoice issued to the buyer, when the sale was billed.
    pub invoice_id: Option<InvoiceId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchFailure {
    pub error: &'static str,
    pub message: String,
}

/// One entry of a batch send.
#[derive(Debug, Clone, Serialize)]
pub struct BatchItem {
    pub invoice_id: InvoiceId,
    pub document: Option<TaxDocument>,
    pub failure: Option<BatchFailure>,
}

impl BatchItem {
    fn sent(invoice_id: InvoiceId, document: TaxDocument) -> Self {
        Self {
            invoice_id,
            document: Some(document),
            failure: None,
        }
    }

    fn failed(invoice_id: InvoiceId, err: &DispatchError) -> Self {
        Self {
            invoice_id,
            document: None,
            failure: Some(BatchFailure {
                error: err.code(),
                message: err.to_string(),
            }),
        }
    }
}

pub struct AppServices {
    dispatcher: CommandDispatcher<Store>,
    /// Held from append until the committed events are projected.
    writes: Mutex<()>,
    properties: Properties,
    products: Products,
    invoices: Invoices,
    catalogs: RwLock<HashMap<TenantId, Catalog>>,
    rounding: RoundingMethod,
    billing: BillingPolicy,
}

pub fn build_services(config: &ApiConfig) -> AppServices {
    AppServices {
        dispatcher: CommandDispatcher::new(Arc::new(InMemoryEventStore::new())),
        writes: Mutex::new(()),
        properties: PropertiesProjection::new(Arc::new(InMemoryTenantStore::new())),
        products: ProductCatalogProjection::new(Arc::new(InMemoryTenantStore::new())),
        invoices: InvoicesProjection::new(Arc::new(InMemoryTenantStore::new())),
        catalogs: RwLock::new(HashMap::new()),
        rounding: config.rounding,
        billing: config.billing,
    }
}

fn catalog_poisoned<T>(_: T) -> DispatchError {
    DispatchError::InvariantViolation("catalog lock poisoned".to_string())
}

fn writes_poisoned<T>(_: T) -> DispatchError {
    DispatchError::InvariantViolation("write lock poisoned".to_string())
}

impl AppServices {
    fn project(&self, committed: &[StoredEvent]) {
        for stored in committed {
            let env = stored.to_envelope();
            let results = [
                ("properties", self.properties.apply_envelope(&env)),
                ("products", self.products.apply_envelope(&env)),
                ("invoices", self.invoices.apply_envelope(&env)),
            ];
            for (projection, result) in results {
                if let Err(e) = result {
                    tracing::warn!(
                        projection,
                        event_id = %stored.event_id,
                        error = %e,
                        "projection update failed"
                    );
                }
            }
        }
    }

    // -------------------------
    // Estate
    // -------------------------

    pub fn property_command(
        &self,
        tenant_id: TenantId,
        property_id: PropertyId,
        command: PropertyCommand,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        let _writes = self.writes.lock().map_err(writes_poisoned)?;
        let committed = self.dispatcher.dispatch(
            tenant_id,
            property_id.0,
            PROPERTY_AGGREGATE,
            &command,
            |id| Property::empty(PropertyId::new(id)),
        )?;
        self.project(&committed);
        Ok(committed)
    }

    pub fn create_property(&self, cmd: CreateProperty) -> Result<Vec<StoredEvent>, DispatchError> {
        self.ensure_catalog_refs(
            cmd.tenant_id,
            cmd.details.property_type_id,
            &cmd.details.tag_ids,
        )?;
        self.property_command(cmd.tenant_id, cmd.property_id, PropertyCommand::CreateProperty(cmd))
    }

    pub fn set_classification(
        &self,
        cmd: SetClassification,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        self.ensure_catalog_refs(cmd.tenant_id, cmd.property_type_id, &cmd.tag_ids)?;
        self.property_command(
            cmd.tenant_id,
            cmd.property_id,
            PropertyCommand::SetClassification(cmd),
        )
    }

    /// Mark the property sold and bill the buyer.
    ///
    /// Only an actual transition is billed; selling an already sold property
    /// commits nothing and issues nothing. A sale without buyer is kept but
    /// not billed. The invoice is built and checked against the sold state
    /// before anything is committed, so a sale that cannot be billed is
    /// rejected as a whole.
    pub fn sell_property(
        &self,
        tenant_id: TenantId,
        property_id: PropertyId,
        occurred_at: DateTime<Utc>,
    ) -> Result<SaleOutcome, DispatchError> {
        let command = PropertyCommand::MarkSold(MarkSold {
            tenant_id,
            property_id,
            occurred_at,
        });
        let unchanged = SaleOutcome {
            events_committed: 0,
            invoice_id: None,
        };

        let mut sold: Property = self
            .dispatcher
            .load_aggregate(tenant_id, property_id.0, |id| Property::empty(PropertyId::new(id)))?;
        if sold.execute(&command)?.is_empty() {
            return Ok(unchanged);
        }
        let issue = self.sale_invoice_for(property_id, &sold, occurred_at)?;

        let committed = self.property_command(tenant_id, property_id, command)?;
        if committed.is_empty() {
            return Ok(unchanged);
        }
        let Some(issue) = issue else {
            return Ok(SaleOutcome {
                events_committed: committed.len(),
                invoice_id: None,
            });
        };

        let invoice_id = issue.invoice_id;
        self.invoice_command(tenant_id, invoice_id, InvoiceCommand::IssueInvoice(issue))
            .inspect_err(|e| {
                tracing::error!(%property_id, %invoice_id, error = %e, "sold property left unbilled");
            })?;
        tracing::info!(%property_id, %invoice_id, "property sale billed");

        Ok(SaleOutcome {
            events_committed: committed.len(),
            invoice_id: Some(invoice_id),
        })
    }

    /// Invoice for a property in its sold state, already accepted by the
    /// invoice rules. `None` when there is no buyer to bill.
    fn sale_invoice_for(
        &self,
        property_id: PropertyId,
        sold: &Property,
        occurred_at: DateTime<Utc>,
    ) -> Result<Option<IssueInvoice>, DispatchError> {
        if sold.buyer_id().is_none() {
            tracing::warn!(%property_id, "sold property has no buyer, not billed");
            return Ok(None);
        }

        let invoice_id = InvoiceId::new(AggregateId::new());
        let issue = sale_invoice(sold, invoice_id, &self.billing, occurred_at)?;
        Invoice::empty(invoice_id).handle(&InvoiceCommand::IssueInvoice(issue.clone()))?;
        Ok(Some(issue))
    }

    pub fn property(&self, tenant_id: TenantId, property_id: PropertyId) -> Option<PropertyReadModel> {
        self.properties.get(tenant_id, &property_id)
    }

    pub fn properties(&self, tenant_id: TenantId, include_archived: bool) -> Vec<PropertyReadModel> {
        self.properties.list(tenant_id, include_archived)
    }

    fn ensure_catalog_refs(
        &self,
        tenant_id: TenantId,
        property_type_id: Option<PropertyTypeId>,
        tag_ids: &[TagId],
    ) -> Result<(), DispatchError> {
        let catalogs = self.catalogs.read().map_err(catalog_poisoned)?;
        match catalogs.get(&tenant_id) {
            Some(catalog) => catalog.ensure_known(property_type_id, tag_ids)?,
            None => Catalog::new().ensure_known(property_type_id, tag_ids)?,
        }
        Ok(())
    }

    pub fn add_property_type(
        &self,
        tenant_id: TenantId,
        name: &str,
        sequence: Option<u32>,
    ) -> Result<PropertyType, DispatchError> {
        let mut catalogs = self.catalogs.write().map_err(catalog_poisoned)?;
        let added = catalogs
            .entry(tenant_id)
            .or_default()
            .add_type(PropertyTypeId::new(AggregateId::new()), name, sequence)?
            .clone();
        tracing::debug!(%tenant_id, name = %added.name, "property type added");
        Ok(added)
    }

    pub fn add_tag(
        &self,
        tenant_id: TenantId,
        name: &str,
        color: u32,
    ) -> Result<PropertyTag, DispatchError> {
        let mut catalogs = self.catalogs.write().map_err(catalog_poisoned)?;
        let added = catalogs
            .entry(tenant_id)
            .or_default()
            .add_tag(TagId::new(AggregateId::new()), name, color)?
            .clone();
        tracing::debug!(%tenant_id, name = %added.name, "property tag added");
        Ok(added)
    }

    pub fn property_types(&self, tenant_id: TenantId) -> Result<Vec<PropertyType>, DispatchError> {
        let catalogs = self.catalogs.read().map_err(catalog_poisoned)?;
        Ok(catalogs
            .get(&tenant_id)
            .map(|c| c.types_ordered().into_iter().cloned().collect())
            .unwrap_or_default())
    }

    pub fn tags(&self, tenant_id: TenantId) -> Result<Vec<PropertyTag>, DispatchError> {
        let catalogs = self.catalogs.read().map_err(catalog_poisoned)?;
        Ok(catalogs
            .get(&tenant_id)
            .map(|c| c.tags_ordered().into_iter().cloned().collect())
            .unwrap_or_default())
    }

    // -------------------------
    // Invoicing
    // -------------------------

    pub fn invoice_command(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
        command: InvoiceCommand,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        let _writes = self.writes.lock().map_err(writes_poisoned)?;
        self.commit_invoice(tenant_id, invoice_id, &command)
    }

    /// Callers hold `writes`.
    fn commit_invoice(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
        command: &InvoiceCommand,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        let committed = self.dispatcher.dispatch(
            tenant_id,
            invoice_id.0,
            INVOICE_AGGREGATE,
            command,
            |id| Invoice::empty(InvoiceId::new(id)),
        )?;
        self.project(&committed);
        Ok(committed)
    }

    fn load_invoice(&self, tenant_id: TenantId, invoice_id: InvoiceId) -> Result<Invoice, DispatchError> {
        self.dispatcher
            .load_aggregate(tenant_id, invoice_id.0, |id| Invoice::empty(InvoiceId::new(id)))
    }

    /// Record the document's state on every invoice it covers.
    ///
    /// Every member must accept the state before the first one is recorded.
    fn record_document(&self, tenant_id: TenantId, document: &TaxDocument) -> Result<(), DispatchError> {
        for issue in &document.issues {
            tracing::warn!(?issue, "tax document issue");
        }

        let occurred_at = Utc::now();
        let records: Vec<(InvoiceId, InvoiceCommand)> = document
            .invoice_ids
            .iter()
            .map(|invoice_id| {
                let command = InvoiceCommand::RecordDocumentState(RecordDocumentState {
                    tenant_id,
                    invoice_id: *invoice_id,
                    state: document.state,
                    global_document_id: document.global_document_id,
                    occurred_at,
                });
                (*invoice_id, command)
            })
            .collect();

        let _writes = self.writes.lock().map_err(writes_poisoned)?;
        for (invoice_id, command) in &records {
            self.load_invoice(tenant_id, *invoice_id)?.handle(command)?;
        }
        for (recorded, (invoice_id, command)) in records.iter().enumerate() {
            self.commit_invoice(tenant_id, *invoice_id, command)
                .inspect_err(|e| {
                    tracing::error!(
                        %tenant_id,
                        %invoice_id,
                        recorded,
                        error = %e,
                        "tax document partially recorded"
                    );
                })?;
        }

        tracing::info!(
            %tenant_id,
            state = document.state.as_str(),
            invoices = document.invoice_ids.len(),
            total = document.total,
            "tax document recorded"
        );
        Ok(())
    }

    pub fn send_tax_document(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
    ) -> Result<TaxDocument, DispatchError> {
        let invoice = self.load_invoice(tenant_id, invoice_id)?;
        let document = build_invoice_document(&invoice, self.rounding)?;
        self.record_document(tenant_id, &document)?;
        Ok(document)
    }

    /// One document consolidating `invoice_ids`; nothing is recorded when
    /// any invoice is missing or already sent.
    pub fn send_global_document(
        &self,
        tenant_id: TenantId,
        invoice_ids: &[InvoiceId],
    ) -> Result<TaxDocument, DispatchError> {
        let invoices = invoice_ids
            .iter()
            .map(|id| self.load_invoice(tenant_id, *id))
            .collect::<Result<Vec<_>, _>>()?;
        let members: Vec<&Invoice> = invoices.iter().collect();

        let document = build_global_document(
            GlobalDocumentId::new(AggregateId::new()),
            &members,
            self.rounding,
        )?;
        self.record_document(tenant_id, &document)?;
        Ok(document)
    }

    /// Independent single-invoice documents; a failure never stops the rest.
    /// Items come back in request order.
    pub fn send_batch(&self, tenant_id: TenantId, invoice_ids: &[InvoiceId]) -> Vec<BatchItem> {
        let mut items = Vec::with_capacity(invoice_ids.len());
        let mut loaded = Vec::with_capacity(invoice_ids.len());
        for invoice_id in invoice_ids {
            match self.load_invoice(tenant_id, *invoice_id) {
                Ok(invoice) => loaded.push(invoice),
                Err(e) => items.push(BatchItem::failed(*invoice_id, &e)),
            }
        }

        for (invoice_id, built) in build_batch(&loaded, self.rounding) {
            let outcome = built
                .map_err(DispatchError::from)
                .and_then(|document| self.record_document(tenant_id, &document).map(|()| document));
            items.push(match outcome {
                Ok(document) => BatchItem::sent(invoice_id, document),
                Err(e) => BatchItem::failed(invoice_id, &e),
            });
        }

        items.sort_by_key(|item| invoice_ids.iter().position(|id| *id == item.invoice_id));
        items
    }

    pub fn invoice(&self, tenant_id: TenantId, invoice_id: InvoiceId) -> Option<InvoiceReadModel> {
        self.invoices.get(tenant_id, &invoice_id)
    }

    pub fn invoices(&self, tenant_id: TenantId, pending_only: bool) -> Vec<InvoiceReadModel> {
        if pending_only {
            self.invoices.pending_documents(tenant_id)
        } else {
            self.invoices.list(tenant_id)
        }
    }

    // -------------------------
    // Products
    // -------------------------

    pub fn product_command(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        command: ProductCommand,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        let _writes = self.writes.lock().map_err(writes_poisoned)?;
        let committed = self.dispatcher.dispatch(
            tenant_id,
            product_id.0,
            PRODUCT_AGGREGATE,
            &command,
            |id| Product::empty(ProductId::new(id)),
        )?;
        self.project(&committed);
        Ok(committed)
    }

    /// SKUs are unique per tenant.
    pub fn create_product(&self, cmd: CreateProduct) -> Result<Vec<StoredEvent>, DispatchError> {
        let sku = cmd.sku.trim();
        if self.products.find_by_sku(cmd.tenant_id, sku).is_some() {
            return Err(DispatchError::Conflict(format!("sku '{sku}' already exists")));
        }
        self.product_command(cmd.tenant_id, cmd.product_id, ProductCommand::CreateProduct(cmd))
    }

    pub fn product(&self, tenant_id: TenantId, product_id: ProductId) -> Option<ProductReadModel> {
        self.products.get(tenant_id, &product_id)
    }

    pub fn products(&self, tenant_id: TenantId) -> Vec<ProductReadModel> {
        self.products.list(tenant_id)
    }

    // -------------------------
    // Read-model maintenance
    // -------------------------

    /// Rebuild every read model of a tenant from its event history.
    pub fn rebuild_read_models(&self, tenant_id: TenantId) -> Result<usize, DispatchError> {
        let _writes = self.writes.lock().map_err(writes_poisoned)?;
        let events = self.dispatcher.store().load_tenant(tenant_id)?;
        let envelopes: Vec<_> = events.iter().map(StoredEvent::to_envelope).collect();

        let results = [
            ("properties", self.properties.rebuild_from_scratch(envelopes.clone())),
            ("products", self.products.rebuild_from_scratch(envelopes.clone())),
            ("invoices", self.invoices.rebuild_from_scratch(envelopes)),
        ];
        for (projection, result) in results {
            result.map_err(|e| {
                DispatchError::InvariantViolation(format!("{projection} rebuild failed: {e}"))
            })?;
        }

        tracing::info!(%tenant_id, events = events.len(), "read models rebuilt");
        Ok(events.len())
    }
}

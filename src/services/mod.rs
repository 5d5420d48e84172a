pub mod catalogue;
pub mod current_inventory;
pub mod inventory_history;
pub mod order_dataset;
pub mod reconcile;
pub mod sales;
pub mod stock_cycles;

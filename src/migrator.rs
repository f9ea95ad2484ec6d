use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_applications_table::Migration),
            Box::new(m20250301_000002_create_payment_cancellations_table::Migration),
            Box::new(m20250301_000003_create_payment_logs_table::Migration),
        ]
    }
}

// Migration implementations

mod m20250301_000001_create_applications_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000001_create_applications_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Create certificate_applications table aligned with entities::application Model
            manager
                .create_table(
                    Table::create()
                        .table(Applications::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Applications::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Applications::OrderId).string().not_null())
                        .col(ColumnDef::new(Applications::Name).string().not_null())
                        .col(ColumnDef::new(Applications::Contact).string().not_null())
                        .col(ColumnDef::new(Applications::BirthPrefix).string().null())
                        .col(
                            ColumnDef::new(Applications::AddressMain)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Applications::AddressDetail).string().null())
                        .col(ColumnDef::new(Applications::PostalCode).string().null())
                        .col(
                            ColumnDef::new(Applications::Certificates)
                                .json()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Applications::CashReceipt).string().null())
                        .col(ColumnDef::new(Applications::PhotoUrl).string().null())
                        .col(
                            ColumnDef::new(Applications::PaymentStatus)
                                .string()
                                .not_null()
                                .default("pending"),
                        )
                        .col(
                            ColumnDef::new(Applications::Amount)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Applications::TradeId).string().null())
                        .col(ColumnDef::new(Applications::MulNo).string().null())
                        .col(ColumnDef::new(Applications::PayMethod).string().null())
                        .col(ColumnDef::new(Applications::PaidAt).timestamp().null())
                        .col(ColumnDef::new(Applications::FailedAt).timestamp().null())
                        .col(ColumnDef::new(Applications::FailedMessage).string().null())
                        .col(ColumnDef::new(Applications::CancelledAt).timestamp().null())
                        .col(
                            ColumnDef::new(Applications::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Applications::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // order_id is the reconciliation key; it must be unique
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_applications_order_id")
                        .table(Applications::Table)
                        .col(Applications::OrderId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_applications_payment_status")
                        .table(Applications::Table)
                        .col(Applications::PaymentStatus)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_applications_created_at")
                        .table(Applications::Table)
                        .col(Applications::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Applications::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Applications {
        #[sea_orm(iden = "certificate_applications")]
        Table,
        Id,
        OrderId,
        Name,
        Contact,
        BirthPrefix,
        AddressMain,
        AddressDetail,
        PostalCode,
        Certificates,
        CashReceipt,
        PhotoUrl,
        PaymentStatus,
        Amount,
        TradeId,
        MulNo,
        PayMethod,
        PaidAt,
        FailedAt,
        FailedMessage,
        CancelledAt,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250301_000002_create_payment_cancellations_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000002_create_payment_cancellations_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PaymentCancellations::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PaymentCancellations::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PaymentCancellations::ApplicationId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PaymentCancellations::OrderId)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PaymentCancellations::MulNo).string().null())
                        .col(
                            ColumnDef::new(PaymentCancellations::CancelType)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PaymentCancellations::Amount)
                                .big_integer()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PaymentCancellations::Reason)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PaymentCancellations::Status)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PaymentCancellations::GatewayMessage)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PaymentCancellations::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_payment_cancellations_order_id")
                        .table(PaymentCancellations::Table)
                        .col(PaymentCancellations::OrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PaymentCancellations::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum PaymentCancellations {
        #[sea_orm(iden = "payment_cancellations")]
        Table,
        Id,
        ApplicationId,
        OrderId,
        MulNo,
        CancelType,
        Amount,
        Reason,
        Status,
        GatewayMessage,
        CreatedAt,
    }
}

mod m20250301_000003_create_payment_logs_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000003_create_payment_logs_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Append-only audit trail; no updates or deletes are ever issued
            manager
                .create_table(
                    Table::create()
                        .table(PaymentLogs::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PaymentLogs::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PaymentLogs::ApplicationId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PaymentLogs::OrderId).string().not_null())
                        .col(ColumnDef::new(PaymentLogs::Action).string().not_null())
                        .col(ColumnDef::new(PaymentLogs::Channel).string().not_null())
                        .col(ColumnDef::new(PaymentLogs::TradeId).string().null())
                        .col(ColumnDef::new(PaymentLogs::Detail).json().null())
                        .col(
                            ColumnDef::new(PaymentLogs::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_payment_logs_order_id")
                        .table(PaymentLogs::Table)
                        .col(PaymentLogs::OrderId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_payment_logs_created_at")
                        .table(PaymentLogs::Table)
                        .col(PaymentLogs::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PaymentLogs::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum PaymentLogs {
        #[sea_orm(iden = "payment_logs")]
        Table,
        Id,
        ApplicationId,
        OrderId,
        Action,
        Channel,
        TradeId,
        Detail,
        CreatedAt,
    }
}

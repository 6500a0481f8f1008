pub mod jobspec_dto;
pub mod manifest_dto;
pub mod subsystem_dto;
